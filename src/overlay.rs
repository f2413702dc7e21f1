//! Annotated frame rendering.
//!
//! Zone outlines are coloured by status (red violating, blue occupied,
//! green empty), the two lane guide lines of each zone are yellow, and each
//! detection gets its stabilized box (white parked, red violating) with a
//! filled dot on its centre. Each zone carries a numbered white marker, and
//! the top-left legend shows the empty, occupied and violating counts.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::engine::FrameReport;
use crate::frame::Frame;
use crate::geometry::{Point, ZoneSet};
use crate::slots::ZoneStatus;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

const CENTER_DOT_RADIUS: i32 = 3;
const ZONE_MARKER_RADIUS: i32 = 7;
/// Marker sits this far above the zone centroid.
const ZONE_MARKER_OFFSET: f64 = 10.0;

const LEGEND_ORIGIN: (i32, i32) = (8, 8);
const LEGEND_SWATCH: u32 = 10;
const LEGEND_SCALE: u32 = 2;

/// 3x5 digit glyphs, one row per byte, high bit on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

pub fn zone_color(status: ZoneStatus) -> Rgb<u8> {
    match status {
        ZoneStatus::Violating => RED,
        ZoneStatus::Occupied => BLUE,
        ZoneStatus::Empty => GREEN,
    }
}

/// Render `report` over a copy of `frame`.
pub fn annotate(frame: &Frame, zones: &ZoneSet, report: &FrameReport) -> RgbImage {
    let mut canvas = frame.image().clone();

    let zone_tallies = zones.iter().zip(&report.assignment.tallies);
    for (index, ((zone, band), tally)) in zone_tallies.enumerate() {
        let color = zone_color(ZoneStatus::from_tally(tally));
        let v = zone.vertices();
        for i in 0..v.len() {
            line(&mut canvas, v[i], v[(i + 1) % v.len()], color);
        }
        line(&mut canvas, band.left.top, band.left.bottom, YELLOW);
        line(&mut canvas, band.right.top, band.right.bottom, YELLOW);

        let c = zone.centroid();
        let marker = (c.x as i32, (c.y - ZONE_MARKER_OFFSET) as i32);
        draw_filled_circle_mut(&mut canvas, marker, ZONE_MARKER_RADIUS, WHITE);
        let label = (index + 1).to_string();
        let left = marker.0 - text_width(&label, 1) as i32 / 2;
        draw_number(&mut canvas, (left, marker.1 - 2), &label, 1, BLACK);
    }

    for record in &report.assignment.records {
        let color = if record.violating { RED } else { WHITE };
        let b = record.bbox;
        if b.width() > 0 && b.height() > 0 {
            let rect = Rect::at(b.x1, b.y1).of_size(b.width() as u32, b.height() as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
        if on_canvas(&canvas, record.center.x, record.center.y) {
            draw_filled_circle_mut(
                &mut canvas,
                (record.center.x, record.center.y),
                CENTER_DOT_RADIUS,
                color,
            );
        }
    }

    draw_legend(&mut canvas, report);
    canvas
}

fn draw_legend(canvas: &mut RgbImage, report: &FrameReport) {
    let counters = report.counters;
    let entries = [
        (GREEN, counters.empty_slots),
        (BLUE, counters.occupied_slots),
        (RED, counters.violation_slots),
    ];
    let (mut x, y) = LEGEND_ORIGIN;
    for (color, count) in entries {
        let swatch = Rect::at(x, y).of_size(LEGEND_SWATCH, LEGEND_SWATCH);
        draw_filled_rect_mut(canvas, swatch, color);
        x += LEGEND_SWATCH as i32 + 4;
        let text = count.to_string();
        draw_number(canvas, (x, y), &text, LEGEND_SCALE, color);
        x += text_width(&text, LEGEND_SCALE) as i32 + 12;
    }
}

fn text_width(text: &str, scale: u32) -> u32 {
    (text.len() as u32 * 4).saturating_sub(1) * scale
}

/// Draw the ASCII digits of `text` with their top-left corner at `origin`.
fn draw_number(
    canvas: &mut RgbImage,
    origin: (i32, i32),
    text: &str,
    scale: u32,
    color: Rgb<u8>,
) {
    let step = scale as i32;
    for (i, digit) in text.chars().filter_map(|c| c.to_digit(10)).enumerate() {
        let glyph_x = origin.0 + i as i32 * 4 * step;
        for (row, bits) in DIGITS[digit as usize].iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    let cell = Rect::at(glyph_x + col * step, origin.1 + row as i32 * step)
                        .of_size(scale, scale);
                    draw_filled_rect_mut(canvas, cell, color);
                }
            }
        }
    }
}

fn on_canvas(canvas: &RgbImage, x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height()
}

fn line(canvas: &mut RgbImage, from: Point, to: Point, color: Rgb<u8>) {
    draw_line_segment_mut(
        canvas,
        (from.x as f32, from.y as f32),
        (to.x as f32, to.y as f32),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use crate::engine::{Engine, EngineSettings, EngineState};
    use crate::geometry::Zone;
    use chrono::Local;

    fn square_engine() -> Engine {
        let zone = Zone::from_pixels("bay", [(10, 10), (10, 90), (90, 90), (90, 10)]).unwrap();
        let zones = ZoneSet::new(vec![zone], 0.35).unwrap();
        Engine::new(zones, EngineSettings::default())
    }

    #[test]
    fn empty_zone_is_outlined_green() {
        let engine = square_engine();
        let frame = Frame::blank(0, Local::now(), 120, 120);
        let report = engine.process_frame(&mut EngineState::new(), frame.captured_at, &[]);
        let img = annotate(&frame, engine.zones(), &report);
        assert_eq!(img.get_pixel(10, 50), &GREEN);
        assert_eq!(img.get_pixel(50, 90), &GREEN);
        // lane guide at 35% across the top edge
        assert_eq!(img.get_pixel(38, 30), &YELLOW);
        assert_eq!(img.get_pixel(110, 110), &Rgb([0, 0, 0]));
    }

    #[test]
    fn legend_and_zone_numbers_are_drawn() {
        let engine = square_engine();
        let frame = Frame::blank(0, Local::now(), 120, 120);
        let report = engine.process_frame(&mut EngineState::new(), frame.captured_at, &[]);
        let img = annotate(&frame, engine.zones(), &report);

        // green swatch, then "1" empty zone: top row of the glyph is 010
        assert_eq!(img.get_pixel(12, 12), &GREEN);
        assert_eq!(img.get_pixel(24, 8), &GREEN);
        assert_eq!(img.get_pixel(22, 8), &BLACK);
        // blue swatch follows with "0"
        assert_eq!(img.get_pixel(43, 12), &BLUE);

        // marker above the centroid (50, 50) reads "1" in black on white
        assert_eq!(img.get_pixel(50, 38), &BLACK);
        assert_eq!(img.get_pixel(49, 38), &WHITE);
    }

    #[test]
    fn off_canvas_detections_are_skipped() {
        let engine = square_engine();
        let frame = Frame::blank(0, Local::now(), 120, 120);
        let far = Detection::new(0, BoundingBox::from_f32([3.0e9, 3.0e9, 3.0e9, 3.0e9]), "car");
        let report = engine.process_frame(&mut EngineState::new(), frame.captured_at, &[far]);
        let img = annotate(&frame, engine.zones(), &report);
        assert_eq!(img.dimensions(), (120, 120));
    }

    #[test]
    fn violator_is_drawn_red() {
        let engine = square_engine();
        let frame = Frame::blank(0, Local::now(), 120, 120);
        let car = Detection::new(0, BoundingBox::new(15, 40, 25, 60), "car");
        let report = engine.process_frame(&mut EngineState::new(), frame.captured_at, &[car]);
        let img = annotate(&frame, engine.zones(), &report);
        assert_eq!(img.get_pixel(10, 50), &RED);
        assert_eq!(img.get_pixel(20, 40), &RED);
        assert_eq!(img.get_pixel(20, 50), &RED);
    }
}
