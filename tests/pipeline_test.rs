//! End-to-end scenarios on synthetic rasters.

use image::{DynamicImage, GrayImage, Luma};
use micr_scan::assets::{self, ReferenceSet};
use micr_scan::config::Config;
use micr_scan::geometry::{x_distance, MinMax, Rect};
use micr_scan::micr;
use micr_scan::preprocessing::steps::polarity::{self, Polarity};
use micr_scan::scanner::{MicrScanner, ScanOptions};

/// Stamp the synthetic reference glyph for a digit index onto a page.
/// Digit indices follow the sheet: 0.."1" through 8.."9", 9.."0".
fn stamp_digit(img: &mut GrayImage, digit_index: i32, x: i32, y: i32) {
    for yy in 0..20 {
        for xx in 0..14 {
            img.put_pixel((x + xx) as u32, (y + yy) as u32, Luma([0]));
        }
    }
    for yy in 0..4 {
        for xx in 0..5 {
            img.put_pixel(
                (x + 4 + xx) as u32,
                (y + 2 + (digit_index % 5) * 3 + yy) as u32,
                Luma([255]),
            );
        }
    }
}

fn scanner() -> MicrScanner {
    let references = ReferenceSet::from_sheet(&assets::synthetic_sheet()).unwrap();
    MicrScanner::with_references(&Config::default(), references).unwrap()
}

#[test]
fn parser_reads_transit_and_on_us_fields() {
    let fields = micr::parse("T123T456U789");
    assert_eq!(fields.routing_number, "123");
    assert_eq!(fields.account_number, "456");
    assert_eq!(fields.check_number, "789");
    assert_eq!(fields.micr_line, "T123T456U789");
}

#[test]
fn parser_handles_literal_and_legacy_alphabets() {
    let literal = micr::parse("U12U T34T 56");
    assert_eq!(literal.check_number, "12");
    assert_eq!(literal.routing_number, "34");
    assert_eq!(literal.account_number, "56");

    let legacy = micr::parse("C12C A34A 56");
    assert_eq!(legacy.check_number, literal.check_number);
    assert_eq!(legacy.routing_number, literal.routing_number);
    assert_eq!(legacy.account_number, literal.account_number);
}

#[test]
fn parser_strips_cheque_number_leading_zeros() {
    let fields = micr::parse("T012T034U056");
    assert_eq!(fields.routing_number, "012");
    assert_eq!(fields.account_number, "034");
    assert_eq!(fields.check_number, "56");
}

#[test]
fn parser_of_empty_input_is_empty() {
    let fields = micr::parse("");
    assert!(fields.routing_number.is_empty());
    assert!(fields.account_number.is_empty());
    assert!(fields.check_number.is_empty());
    assert!(fields.micr_line.is_empty());
}

#[test]
fn geometry_literals_hold() {
    let a = MinMax::new(0, 100);
    let b = MinMax::new(50, 150);
    assert!((a.fraction_intersects(&b) - 0.5).abs() < 1e-9);

    let r1 = Rect::new(26, 33, 15, 8);
    let r2 = Rect::new(105, 28, 9, 10);
    assert_eq!(x_distance(&r1, &r2), 64);
}

#[test]
fn polarity_follows_mean_intensity() {
    let light = GrayImage::from_pixel(200, 100, Luma([200]));
    assert_eq!(polarity::analyze(&light), Polarity::LightBackground);

    let dark = GrayImage::from_pixel(200, 100, Luma([50]));
    assert_eq!(polarity::analyze(&dark), Polarity::DarkBackground);
}

#[test]
fn scan_reads_a_clean_micr_row() {
    let mut page = GrayImage::from_pixel(700, 240, Luma([255]));
    // "45120" in the bottom band (kept region starts at y = 144).
    for (i, digit) in [3i32, 4, 0, 1, 9].iter().enumerate() {
        stamp_digit(&mut page, *digit, 180 + i as i32 * 30, 190);
    }

    let outcome = scanner()
        .scan(
            "clean-row",
            DynamicImage::ImageLuma8(page),
            &ScanOptions::default(),
        )
        .unwrap();

    assert!(!outcome.overlap);
    let translation = &outcome.translations["template"];
    let details = translation.details.as_ref().unwrap();
    assert_eq!(details.value, "45120");
    assert!(details.score > 80.0);
}

#[test]
fn scan_with_overhanging_stroke_corrects_overlap() {
    let mut page = GrayImage::from_pixel(700, 240, Luma([255]));
    // Row with one digit fused to a stroke dropping in from above the band.
    let digits = [0i32, 1, 2, 3, 9];
    for (i, digit) in digits.iter().enumerate() {
        stamp_digit(&mut page, *digit, 180 + i as i32 * 30, 190);
    }
    // Stroke through the middle digit, reaching well above the band crop.
    for y in 100..190 {
        for x in 244..248 {
            page.put_pixel(x, y, Luma([0]));
        }
    }

    let outcome = scanner()
        .scan(
            "overlap-row",
            DynamicImage::ImageLuma8(page),
            &ScanOptions::default(),
        )
        .unwrap();

    assert!(outcome.overlap, "projection recovery should flag overlap");
    assert!(
        outcome.stages.iter().any(|s| s.name == "overlap"),
        "corrected raster retained as a stage"
    );
    let translation = outcome
        .translations
        .get("template")
        .expect("template translator ran after correction");
    let details = translation.details.as_ref().unwrap();
    assert!(
        details.chars.len() >= 4,
        "kept {} characters",
        details.chars.len()
    );
}

#[test]
fn scan_fails_fast_on_unknown_translator() {
    let page = GrayImage::from_pixel(300, 150, Luma([255]));
    let options = ScanOptions {
        translators: vec!["imaginary".to_string()],
        ..Default::default()
    };
    let err = scanner()
        .scan("bad-name", DynamicImage::ImageLuma8(page), &options)
        .unwrap_err();
    assert!(err.to_string().contains("unknown translator"));
}
