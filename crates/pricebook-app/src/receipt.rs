// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Receipt layout.
//!
//! [`layout`] turns selected items into a device-independent [`ReceiptPlan`]:
//! a header, wrapped title runs, dot-filled priced lines, a timestamp, and a
//! total. Widths come from a [`Measure`] supplied by the caller, so the same
//! plan drives a PDF-style page (points) or a monospace terminal (columns).

use time::OffsetDateTime;
use time::macros::format_description;

use crate::model::LineItem;
use crate::money::{Locale, format_receipt_price};

/// Gap kept between a title and its price before the price is pushed to a
/// line of its own.
pub const SAFETY_MARGIN: f64 = 5.0;

pub const DEFAULT_PAGE_WIDTH: f64 = 190.0;
pub const DEFAULT_LINE_HEIGHT: f64 = 8.0;

/// Measures rendered text width in page units.
pub trait Measure {
    fn width(&self, text: &str) -> f64;
}

impl<F> Measure for F
where
    F: Fn(&str) -> f64,
{
    fn width(&self, text: &str) -> f64 {
        self(text)
    }
}

/// Every character is `unit` wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    pub unit: f64,
}

impl MonospaceMeasure {
    pub const fn new(unit: f64) -> Self {
        Self { unit }
    }
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Measure for MonospaceMeasure {
    fn width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.unit
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    pub page_width: f64,
    pub line_height: f64,
    pub locale: Locale,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            page_width: DEFAULT_PAGE_WIDTH,
            line_height: DEFAULT_LINE_HEIGHT,
            locale: Locale::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanEntry {
    /// A left-aligned run of title text.
    TextRun { content: String, width: f64 },
    /// Label, `dot_count` dots, then the price flush right.
    PricedLine {
        label_text: String,
        dot_count: usize,
        price_text: String,
    },
    Timestamp { text: String },
    Total {
        label: String,
        amount_cents: i64,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPlan {
    pub header: String,
    pub lines: Vec<PlanEntry>,
    pub total_cents: i64,
    pub page_width: f64,
    pub line_height: f64,
}

/// Lays out `items` in the order given.
pub fn layout<M: Measure + ?Sized>(
    items: &[LineItem],
    page: &PageSpec,
    title: Option<&str>,
    measure: &M,
    printed_at: OffsetDateTime,
) -> ReceiptPlan {
    let header = title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(page.locale.header_placeholder())
        .to_owned();

    let mut lines = Vec::new();
    let mut total_cents = 0_i64;
    for item in items {
        total_cents = total_cents.saturating_add(item.price_cents);
        layout_item(item, page, measure, &mut lines);
    }

    lines.push(PlanEntry::Timestamp {
        text: format_timestamp(printed_at),
    });
    let label = page.locale.total_label().to_owned();
    let text = format!(
        "{label}: {}",
        format_receipt_price(total_cents, page.locale)
    );
    lines.push(PlanEntry::Total {
        label,
        amount_cents: total_cents,
        text,
    });

    ReceiptPlan {
        header,
        lines,
        total_cents,
        page_width: page.page_width,
        line_height: page.line_height,
    }
}

fn layout_item<M: Measure + ?Sized>(
    item: &LineItem,
    page: &PageSpec,
    measure: &M,
    lines: &mut Vec<PlanEntry>,
) {
    let page_width = page.page_width;
    let price_text = format_receipt_price(item.price_cents, page.locale);
    let price_width = measure.width(&price_text);
    let dot_width = measure.width(".");

    let mut wrapped = wrap_text(&item.full_title(), page_width, measure);
    let last = wrapped.pop().unwrap_or_default();
    for content in wrapped {
        let width = measure.width(&content);
        lines.push(PlanEntry::TextRun { content, width });
    }

    let last_width = measure.width(&last);
    if last_width + price_width < page_width - SAFETY_MARGIN {
        lines.push(PlanEntry::PricedLine {
            label_text: last,
            dot_count: dot_count(page_width - last_width - price_width, dot_width),
            price_text,
        });
    } else {
        lines.push(PlanEntry::TextRun {
            content: last,
            width: last_width,
        });
        lines.push(PlanEntry::PricedLine {
            label_text: String::new(),
            dot_count: dot_count(page_width - price_width, dot_width),
            price_text,
        });
    }
}

fn dot_count(gap: f64, dot_width: f64) -> usize {
    if dot_width <= 0.0 || !gap.is_finite() || gap <= 0.0 {
        return 0;
    }
    (gap / dot_width).floor() as usize
}

fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] [hour]:[minute]");
    at.format(&format).unwrap_or_else(|_| at.to_string())
}

/// Greedy word wrap. Each returned line fits `max_width` unless it holds a
/// single word that is wider on its own. Never returns an empty vector.
pub fn wrap_text<M: Measure + ?Sized>(text: &str, max_width: f64, measure: &M) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let cut = break_point(rest, max_width, measure);
        let (line, tail) = rest.split_at(cut);
        lines.push(line.trim_end().to_owned());
        rest = tail.trim_start();
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Byte offset where the first line of `rest` ends. Always > 0.
fn break_point<M: Measure + ?Sized>(rest: &str, max_width: f64, measure: &M) -> usize {
    let chars = rest.char_indices().collect::<Vec<_>>();

    // Longest prefix that fits, in characters.
    let mut fit = 0;
    let mut candidate = String::new();
    for &(_, ch) in &chars {
        candidate.push(ch);
        if measure.width(&candidate) > max_width {
            break;
        }
        fit += 1;
    }

    let offset = |index: usize| chars.get(index).map_or(rest.len(), |&(at, _)| at);
    if fit == chars.len() {
        return rest.len();
    }
    if fit > 0 && (chars[fit - 1].1.is_whitespace() || chars[fit].1.is_whitespace()) {
        return offset(fit);
    }
    if let Some(space) = (1..fit).rev().find(|&index| chars[index - 1].1.is_whitespace()) {
        return offset(space);
    }

    // No boundary inside the fitting prefix: the whole word overflows.
    let word_end = chars
        .iter()
        .position(|&(_, ch)| ch.is_whitespace())
        .unwrap_or(chars.len())
        .max(1);
    offset(word_end)
}

/// Renders a plan on a fixed-width text grid of `columns` characters.
///
/// The plan is scaled to the grid: dot counts are recomputed for the column
/// width so prices stay flush right regardless of the page unit.
pub fn render_text(plan: &ReceiptPlan, columns: usize) -> String {
    let columns = columns.max(1);
    let mut out = String::new();
    push_line(&mut out, &center(&plan.header, columns));
    for entry in &plan.lines {
        let line = match entry {
            PlanEntry::TextRun { content, .. } => content.clone(),
            PlanEntry::PricedLine {
                label_text,
                price_text,
                ..
            } => {
                let used = label_text.chars().count() + price_text.chars().count();
                let dots = columns.saturating_sub(used);
                format!("{label_text}{}{price_text}", ".".repeat(dots))
            }
            PlanEntry::Timestamp { text } => right_align(text, columns),
            PlanEntry::Total { text, .. } => right_align(text, columns),
        };
        push_line(&mut out, &line);
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn center(text: &str, columns: usize) -> String {
    let width = text.chars().count();
    let pad = columns.saturating_sub(width) / 2;
    format!("{}{text}", " ".repeat(pad))
}

fn right_align(text: &str, columns: usize) -> String {
    let width = text.chars().count();
    format!("{}{text}", " ".repeat(columns.saturating_sub(width)))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{
        Measure, MonospaceMeasure, PageSpec, PlanEntry, SAFETY_MARGIN, layout, render_text,
        wrap_text,
    };
    use crate::{LineItem, Locale, SheetRow, SourceRowIndex};

    fn item(index: usize, title: &str, price_cents: i64) -> LineItem {
        LineItem {
            source_row_index: SourceRowIndex::new(index),
            sheet_row: SheetRow::new(index as u32 + 2),
            group: None,
            title: title.to_owned(),
            price_cents,
            tag0_text: String::new(),
            tag0_color: None,
            tag1_text: String::new(),
            tag1_color: None,
            time: String::new(),
        }
    }

    fn page(width: f64) -> PageSpec {
        PageSpec {
            page_width: width,
            ..PageSpec::default()
        }
    }

    fn printed_at() -> time::OffsetDateTime {
        datetime!(2026-03-14 09:05 UTC)
    }

    fn priced_lines(entries: &[PlanEntry]) -> Vec<&PlanEntry> {
        entries
            .iter()
            .filter(|entry| matches!(entry, PlanEntry::PricedLine { .. }))
            .collect()
    }

    #[test]
    fn short_title_fits_on_one_priced_line() {
        let measure = MonospaceMeasure::new(2.0);
        let plan = layout(
            &[item(0, "CBC", 50_000)],
            &page(190.0),
            None,
            &measure,
            printed_at(),
        );
        let priced = priced_lines(&plan.lines);
        assert_eq!(priced.len(), 1);
        let PlanEntry::PricedLine {
            label_text,
            dot_count,
            price_text,
        } = priced[0]
        else {
            panic!("expected a priced line");
        };
        assert_eq!(label_text, "CBC");
        assert_eq!(price_text, "500.00 с");
        // 190 - 3*2 - 8*2 = 168, over 2 per dot
        assert_eq!(*dot_count, 84);
        assert_eq!(plan.total_cents, 50_000);
    }

    #[test]
    fn header_falls_back_to_locale_placeholder() {
        let measure = MonospaceMeasure::default();
        let anonymous = layout(&[], &page(40.0), Some("   "), &measure, printed_at());
        assert_eq!(anonymous.header, "Без имени");

        let english = PageSpec {
            locale: Locale::En,
            ..page(40.0)
        };
        let anonymous = layout(&[], &english, None, &measure, printed_at());
        assert_eq!(anonymous.header, "Unnamed");

        let named = layout(&[], &page(40.0), Some(" Ivanov "), &measure, printed_at());
        assert_eq!(named.header, "Ivanov");
    }

    #[test]
    fn empty_selection_still_has_timestamp_and_zero_total() {
        let plan = layout(
            &[],
            &page(40.0),
            None,
            &MonospaceMeasure::default(),
            printed_at(),
        );
        assert_eq!(
            plan.lines,
            vec![
                PlanEntry::Timestamp {
                    text: "14.03.2026 09:05".to_owned()
                },
                PlanEntry::Total {
                    label: "Итого".to_owned(),
                    amount_cents: 0,
                    text: "Итого: 0.00 с".to_owned(),
                },
            ]
        );
        assert_eq!(plan.page_width, 40.0);
        assert_eq!(plan.line_height, page(40.0).line_height);
    }

    #[test]
    fn total_is_sum_of_item_prices() {
        let items = vec![
            item(0, "A", 12_345),
            item(1, "B", 0),
            item(2, "C", 99_999),
        ];
        let plan = layout(
            &items,
            &page(60.0),
            None,
            &MonospaceMeasure::default(),
            printed_at(),
        );
        assert_eq!(plan.total_cents, 112_344);
        assert!(matches!(
            plan.lines.last(),
            Some(PlanEntry::Total { amount_cents: 112_344, .. })
        ));
    }

    #[test]
    fn one_priced_line_per_item_in_order() {
        let items = vec![
            item(0, "first", 100),
            item(1, "a much longer title that has to wrap around", 200),
            item(2, "third", 300),
        ];
        let plan = layout(
            &items,
            &page(20.0),
            None,
            &MonospaceMeasure::default(),
            printed_at(),
        );
        let prices = priced_lines(&plan.lines)
            .into_iter()
            .map(|entry| match entry {
                PlanEntry::PricedLine { price_text, .. } => price_text.clone(),
                _ => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(prices, vec!["1.00 с", "2.00 с", "3.00 с"]);
    }

    #[test]
    fn long_title_wraps_and_keeps_every_line_in_page() {
        let measure = MonospaceMeasure::default();
        let title = "Determination of antibodies to hepatitis C virus total";
        let plan = layout(
            &[item(0, title, 120_000)],
            &page(20.0),
            None,
            &measure,
            printed_at(),
        );
        let runs = plan
            .lines
            .iter()
            .filter_map(|entry| match entry {
                PlanEntry::TextRun { content, width } => Some((content.clone(), *width)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(runs.len() >= 2);
        for (content, width) in &runs {
            assert!(*width <= 20.0, "run {content:?} overflows");
        }
        let PlanEntry::PricedLine { label_text, .. } = priced_lines(&plan.lines)[0] else {
            panic!("expected a priced line");
        };
        let mut words = runs
            .iter()
            .map(|(content, _)| content.as_str())
            .collect::<Vec<_>>();
        words.push(label_text);
        assert_eq!(
            words.join(" ").split_whitespace().collect::<Vec<_>>(),
            title.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn price_moves_to_own_line_when_last_run_is_too_wide() {
        let measure = MonospaceMeasure::new(6.0);
        // "ABCDEFGHIJ" = 60, "5.00 с" = 36; 96 is not below 100 - 5.
        let plan = layout(
            &[item(0, "ABCDEFGHIJ", 500)],
            &page(100.0),
            None,
            &measure,
            printed_at(),
        );
        assert_eq!(
            plan.lines[..2],
            [
                PlanEntry::TextRun {
                    content: "ABCDEFGHIJ".to_owned(),
                    width: 60.0
                },
                PlanEntry::PricedLine {
                    label_text: String::new(),
                    dot_count: 10,
                    price_text: "5.00 с".to_owned(),
                },
            ]
        );
    }

    // A title exactly as wide as the page could also be read as one priced
    // line with zero dots. The fit test is `label + price < width - margin`,
    // which a full-width label can never pass, so the price moves down.
    #[test]
    fn title_filling_the_page_wraps_then_prices_alone() {
        let measure = MonospaceMeasure::default();
        let title = "x".repeat(30);
        let plan = layout(
            &[item(0, &title, 100)],
            &page(30.0),
            None,
            &measure,
            printed_at(),
        );
        assert_eq!(
            plan.lines[0],
            PlanEntry::TextRun {
                content: title,
                width: 30.0
            }
        );
        assert!(matches!(
            &plan.lines[1],
            PlanEntry::PricedLine { label_text, dot_count: 24, .. } if label_text.is_empty()
        ));
    }

    #[test]
    fn tag_texts_join_the_priced_label() {
        let mut tagged = item(0, "CBC", 50_000);
        tagged.tag0_text = "urgent".to_owned();
        tagged.tag1_text = " ".to_owned();
        let plan = layout(
            &[tagged],
            &page(190.0),
            None,
            &MonospaceMeasure::new(2.0),
            printed_at(),
        );
        assert_eq!(
            plan.lines[0],
            PlanEntry::PricedLine {
                label_text: "CBC (urgent)".to_owned(),
                // 190 - 12*2 - 8*2 = 150, over 2 per dot
                dot_count: 75,
                price_text: "500.00 с".to_owned(),
            }
        );
    }

    #[test]
    fn tags_can_push_a_title_onto_a_second_line() {
        let mut tagged = item(0, "Ferritin", 900);
        tagged.tag0_text = "cito".to_owned();
        tagged.tag1_text = "fasting".to_owned();
        // "Ferritin" plus "9.00 с" fits a 20 column page; the tagged label
        // "Ferritin (cito, fasting)" is 24 wide and wraps.
        let plan = layout(
            &[tagged],
            &page(20.0),
            None,
            &MonospaceMeasure::default(),
            printed_at(),
        );
        assert_eq!(
            plan.lines[..2],
            [
                PlanEntry::TextRun {
                    content: "Ferritin (cito,".to_owned(),
                    width: 15.0,
                },
                PlanEntry::PricedLine {
                    label_text: "fasting)".to_owned(),
                    dot_count: 6,
                    price_text: "9.00 с".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn tight_fit_produces_zero_dots() {
        let measure = MonospaceMeasure::new(6.0);
        // label 3*6 + price 6*6 = 54; page 59.5 leaves half a dot.
        let page_width = 54.0 + SAFETY_MARGIN + 0.5;
        let plan = layout(
            &[item(0, "CBC", 500)],
            &page(page_width),
            None,
            &measure,
            printed_at(),
        );
        assert_eq!(
            plan.lines[0],
            PlanEntry::PricedLine {
                label_text: "CBC".to_owned(),
                dot_count: 0,
                price_text: "5.00 с".to_owned(),
            }
        );
    }

    #[test]
    fn empty_title_still_gets_priced_line() {
        let plan = layout(
            &[item(0, "", 700)],
            &page(40.0),
            None,
            &MonospaceMeasure::default(),
            printed_at(),
        );
        assert!(matches!(
            &plan.lines[0],
            PlanEntry::PricedLine { label_text, .. } if label_text.is_empty()
        ));
    }

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        let measure = MonospaceMeasure::default();
        assert_eq!(
            wrap_text("alpha beta gamma", 11.0, &measure),
            vec!["alpha beta", "gamma"]
        );
        assert_eq!(
            wrap_text("alpha beta gamma", 8.0, &measure),
            vec!["alpha", "beta", "gamma"]
        );
        assert_eq!(wrap_text("  lead", 10.0, &measure), vec!["lead"]);
        assert_eq!(wrap_text("", 10.0, &measure), vec![""]);
    }

    #[test]
    fn overlong_word_overflows_instead_of_splitting() {
        let measure = MonospaceMeasure::default();
        assert_eq!(
            wrap_text("supercalifragilistic is long", 8.0, &measure),
            vec!["supercalifragilistic", "is long"]
        );
    }

    #[test]
    fn wrap_accepts_closure_measures() {
        let wide_w = |text: &str| {
            text.chars()
                .map(|ch| if ch == 'W' { 2.0 } else { 1.0 })
                .sum::<f64>()
        };
        assert_eq!(wide_w.width("WW a"), 6.0);
        assert_eq!(wrap_text("WWW a", 5.0, &wide_w), vec!["WWW", "a"]);
    }

    #[test]
    fn text_render_aligns_prices_to_the_right_edge() {
        let plan = layout(
            &[item(0, "CBC", 50_000), item(1, "Glucose", 25_000)],
            &page(190.0),
            Some("Ivanov"),
            &MonospaceMeasure::new(190.0 / 32.0),
            printed_at(),
        );
        let rendered = render_text(&plan, 32);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0].trim(), "Ivanov");
        assert_eq!(lines[1], "CBC.....................500.00 с");
        assert_eq!(lines[2], "Glucose.................250.00 с");
        assert!(lines[3].ends_with("14.03.2026 09:05"));
        assert!(lines[4].ends_with("Итого: 750.00 с"));
        for line in &lines[1..] {
            assert_eq!(line.chars().count(), 32);
        }
    }
}
