// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::SourceRowIndex;
use crate::model::LineItem;
use crate::money::Locale;

/// A parsed workbook as shown in one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub name: String,
    pub items: Vec<LineItem>,
}

impl Workbook {
    pub fn new(name: impl Into<String>, items: Vec<LineItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn item(&self, index: SourceRowIndex) -> Option<&LineItem> {
        self.items.get(index.get())
    }
}

/// A run of items sharing one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub label: String,
    pub group: Option<String>,
    pub items: Vec<&'a LineItem>,
}

/// Case-insensitive substring match on the title. An empty or blank query
/// keeps every item.
pub fn filter_items<'a>(items: &'a [LineItem], query: &str) -> Vec<&'a LineItem> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| needle.is_empty() || item.title.to_lowercase().contains(&needle))
        .collect()
}

/// Groups items into sections sorted by group name with ungrouped items
/// last. Items keep their input order inside a section.
pub fn group_items<'a, I>(items: I, locale: Locale) -> Vec<Section<'a>>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut grouped: BTreeMap<&'a str, Vec<&'a LineItem>> = BTreeMap::new();
    let mut ungrouped = Vec::new();
    for item in items {
        match item.group_label() {
            Some(group) => grouped.entry(group).or_default().push(item),
            None => ungrouped.push(item),
        }
    }

    let mut sections = grouped
        .into_iter()
        .map(|(group, items)| Section {
            label: group.to_owned(),
            group: Some(group.to_owned()),
            items,
        })
        .collect::<Vec<_>>();
    if !ungrouped.is_empty() {
        sections.push(Section {
            label: locale.ungrouped_label().to_owned(),
            group: None,
            items: ungrouped,
        });
    }
    sections
}

/// Selected items per workbook name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    by_workbook: BTreeMap<String, BTreeSet<SourceRowIndex>>,
}

impl Selection {
    /// Flips the selection of one item and returns whether it is now selected.
    pub fn toggle(&mut self, workbook: &str, index: SourceRowIndex) -> bool {
        let set = self.by_workbook.entry(workbook.to_owned()).or_default();
        let selected = if set.remove(&index) {
            false
        } else {
            set.insert(index);
            true
        };
        if set.is_empty() {
            self.by_workbook.remove(workbook);
        }
        selected
    }

    pub fn is_selected(&self, workbook: &str, index: SourceRowIndex) -> bool {
        self.by_workbook
            .get(workbook)
            .is_some_and(|set| set.contains(&index))
    }

    pub fn clear_all(&mut self) {
        self.by_workbook.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_workbook.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_workbook.values().map(BTreeSet::len).sum()
    }

    /// Drops indices that no longer exist after a workbook was reloaded.
    pub fn retain_valid(&mut self, workbooks: &[Workbook]) {
        self.by_workbook.retain(|name, set| {
            let Some(workbook) = workbooks.iter().find(|workbook| &workbook.name == name) else {
                return false;
            };
            set.retain(|index| index.get() < workbook.items.len());
            !set.is_empty()
        });
    }

    /// Selected items of one workbook in index order.
    pub fn selected<'a>(&self, workbook: &'a Workbook) -> Vec<&'a LineItem> {
        self.by_workbook
            .get(&workbook.name)
            .into_iter()
            .flatten()
            .filter_map(|index| workbook.item(*index))
            .collect()
    }

    /// Every selected item, workbook by workbook in the order given.
    pub fn selected_across<'a>(&self, workbooks: &'a [Workbook]) -> Vec<(&'a str, &'a LineItem)> {
        workbooks
            .iter()
            .flat_map(|workbook| {
                self.selected(workbook)
                    .into_iter()
                    .map(move |item| (workbook.name.as_str(), item))
            })
            .collect()
    }

    pub fn total_cents(&self, workbooks: &[Workbook]) -> i64 {
        self.selected_across(workbooks)
            .into_iter()
            .fold(0_i64, |total, (_, item)| total.saturating_add(item.price_cents))
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, Workbook, filter_items, group_items};
    use crate::{LineItem, Locale, SheetRow, SourceRowIndex};

    fn item(index: usize, group: Option<&str>, title: &str, price_cents: i64) -> LineItem {
        LineItem {
            source_row_index: SourceRowIndex::new(index),
            sheet_row: SheetRow::new(index as u32 + 2),
            group: group.map(str::to_owned),
            title: title.to_owned(),
            price_cents,
            tag0_text: String::new(),
            tag0_color: None,
            tag1_text: String::new(),
            tag1_color: None,
            time: String::new(),
        }
    }

    fn sample() -> Vec<LineItem> {
        vec![
            item(0, None, "Consultation", 100_000),
            item(1, Some("Hormones"), "TSH", 70_000),
            item(2, Some("Biochemistry"), "Glucose", 25_000),
            item(3, Some("Hormones"), "Free T4", 75_000),
            item(4, Some("Biochemistry"), "ALT", 30_000),
        ]
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let items = sample();
        let titles = |query| {
            filter_items(&items, query)
                .into_iter()
                .map(|item| item.title.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(titles("t4"), vec!["Free T4"]);
        assert_eq!(titles("GLU"), vec!["Glucose"]);
        assert_eq!(titles("  ").len(), 5);
        assert!(titles("ferritin").is_empty());
    }

    #[test]
    fn filter_handles_cyrillic_case() {
        let items = vec![item(0, None, "Общий анализ крови", 50_000)];
        assert_eq!(filter_items(&items, "АНАЛИЗ").len(), 1);
    }

    #[test]
    fn sections_sort_by_group_with_ungrouped_last() {
        let items = sample();
        let sections = group_items(&items, Locale::Ru);
        let summary = sections
            .iter()
            .map(|section| {
                (
                    section.label.as_str(),
                    section
                        .items
                        .iter()
                        .map(|item| item.title.as_str())
                        .collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("Biochemistry", vec!["Glucose", "ALT"]),
                ("Hormones", vec!["TSH", "Free T4"]),
                ("Без категории", vec!["Consultation"]),
            ]
        );
        assert_eq!(sections[2].group, None);
    }

    #[test]
    fn grouping_filtered_items_omits_empty_sections() {
        let items = sample();
        let sections = group_items(filter_items(&items, "tsh"), Locale::En);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].label, "Hormones");
    }

    #[test]
    fn selection_toggles_and_totals_across_workbooks() {
        let lab = Workbook::new("lab.xlsx", sample());
        let clinic = Workbook::new("clinic.xlsx", vec![item(0, None, "Visit", 12_550)]);
        let workbooks = vec![lab, clinic];

        let mut selection = Selection::default();
        assert!(selection.toggle("lab.xlsx", SourceRowIndex::new(2)));
        assert!(selection.toggle("lab.xlsx", SourceRowIndex::new(0)));
        assert!(selection.toggle("clinic.xlsx", SourceRowIndex::new(0)));
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.total_cents(&workbooks), 137_550);

        let titles = selection
            .selected(&workbooks[0])
            .into_iter()
            .map(|item| item.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Consultation", "Glucose"]);

        assert!(!selection.toggle("lab.xlsx", SourceRowIndex::new(0)));
        assert_eq!(selection.total_cents(&workbooks), 37_550);

        selection.clear_all();
        assert!(selection.is_empty());
        assert_eq!(selection.total_cents(&workbooks), 0);
    }

    #[test]
    fn retain_valid_drops_vanished_items_and_workbooks() {
        let mut selection = Selection::default();
        selection.toggle("lab.xlsx", SourceRowIndex::new(1));
        selection.toggle("lab.xlsx", SourceRowIndex::new(9));
        selection.toggle("gone.xlsx", SourceRowIndex::new(0));

        selection.retain_valid(&[Workbook::new("lab.xlsx", sample())]);
        assert_eq!(selection.len(), 1);
        assert!(selection.is_selected("lab.xlsx", SourceRowIndex::new(1)));
        assert!(!selection.is_selected("gone.xlsx", SourceRowIndex::new(0)));
    }
}
