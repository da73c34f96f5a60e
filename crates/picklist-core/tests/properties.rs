//! Property tests for the cache and controller invariants.

#![allow(clippy::unwrap_used, clippy::panic)]

use picklist_core::{
    Collection, Completion, ControllerConfig, DependencyFilter, DropdownController, FetchKind,
    FilterValue, Key, PageOutcome, PageResult, QueryContext, SelectCache, SelectOption, Timestamp,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn context() -> QueryContext {
    QueryContext::new(Collection::DegreePrograms, "edit-form")
}

fn option_batch() -> impl Strategy<Value = Vec<SelectOption>> {
    prop::collection::vec(0u16..40, 0..15).prop_map(|ids| {
        ids.into_iter()
            .map(|id| SelectOption::new(id.to_string(), format!("Record {}", id)))
            .collect()
    })
}

proptest! {
    #[test]
    fn appended_items_never_repeat_an_id(batches in prop::collection::vec(option_batch(), 1..8)) {
        let mut cache = SelectCache::default();
        for (i, batch) in batches.into_iter().enumerate() {
            cache.append_items(&context(), batch, Timestamp(i as u64));
        }
        let items = &cache.peek(&context()).items;
        let unique: BTreeSet<&str> = items.iter().map(|o| o.id.as_str()).collect();
        prop_assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn append_preserves_first_seen_order(first in option_batch(), second in option_batch()) {
        let mut cache = SelectCache::default();
        cache.set_items(&context(), first.clone(), Timestamp(0));
        cache.append_items(&context(), second, Timestamp(1));

        let mut expected: Vec<String> = Vec::new();
        for o in &first {
            if !expected.contains(&o.id) {
                expected.push(o.id.clone());
            }
        }
        let prefix: Vec<String> = cache.peek(&context()).items
            .iter()
            .take(expected.len())
            .map(|o| o.id.clone())
            .collect();
        prop_assert_eq!(prefix, expected);
    }

    #[test]
    fn dependency_change_always_empties_context(
        loaded in option_batch(),
        old in "[A-Z][0-9]",
        new in "[a-z][0-9]",
    ) {
        let mut cache = SelectCache::default();
        let mut picker = DropdownController::new(context(), ControllerConfig::default())
            .with_filters(vec![DependencyFilter::new("university_id", FilterValue::Text(old))]);

        if let Some(cmd) = picker.open(&mut cache, Timestamp(0)) {
            picker.complete(
                &mut cache,
                cmd.token,
                PageOutcome::Page(PageResult::from_records(loaded.clone(), 10)),
                Timestamp(1),
            );
        }
        if let Some(first) = loaded.first() {
            picker.select(&mut cache, &first.id);
        }

        picker.set_dependency(&mut cache, "university_id", FilterValue::Text(new));
        let entry = cache.peek(&context());
        prop_assert!(entry.items.is_empty());
        prop_assert_eq!(entry.page, 0);
        prop_assert!(entry.selected_item.is_none());
    }

    #[test]
    fn highlight_stays_within_bounds(count in 0u32..12, keys in prop::collection::vec(0u8..2, 0..40)) {
        let mut cache = SelectCache::default();
        let mut picker = DropdownController::new(context(), ControllerConfig::default());
        let cmd = picker.open(&mut cache, Timestamp(0)).unwrap();
        let data = (0..count).map(|i| SelectOption::new(i.to_string(), "x")).collect();
        picker.complete(&mut cache, cmd.token, PageOutcome::Page(PageResult::from_records(data, 10)), Timestamp(0));

        for k in keys {
            let key = if k == 0 { Key::ArrowDown } else { Key::ArrowUp };
            picker.key(&mut cache, key);
            if let Some(i) = picker.highlighted() {
                prop_assert!(i < count as usize);
            }
        }
    }

    #[test]
    fn only_latest_search_is_ever_applied(terms in prop::collection::vec("[a-z]{1,4}", 2..6)) {
        let mut cache = SelectCache::default();
        let mut picker = DropdownController::new(context(), ControllerConfig::default());
        let load = picker.open(&mut cache, Timestamp(0)).unwrap();
        picker.complete(&mut cache, load.token, PageOutcome::Page(PageResult::empty()), Timestamp(0));

        let mut now = 0;
        let mut issued = Vec::new();
        for term in &terms {
            now += 1_000;
            picker.input_search(term.clone(), Timestamp(now));
            if let Some(cmd) = picker.poll_debounce(&mut cache, Timestamp(now + 500)) {
                issued.push((cmd.token, cmd.request.search_term.clone()));
            }
        }

        // Complete in reverse: only the newest command should stick.
        for (token, term) in issued.iter().rev() {
            let result = vec![SelectOption::new(format!("{}-hit", term), term.clone())];
            picker.complete(
                &mut cache,
                *token,
                PageOutcome::Page(PageResult::from_records(result, 10)),
                Timestamp(now + 600),
            );
        }

        if let Some((_, last_term)) = issued.last() {
            let shown: Vec<&str> = picker.visible_items(&cache).iter().map(|o| o.name.as_str()).collect();
            prop_assert_eq!(shown, vec![last_term.as_str()]);
        }
    }

    #[test]
    fn page_issued_before_reset_or_invalidation_never_lands(
        loaded in option_batch(),
        resets in 0usize..3,
        invalidations in 0usize..3,
    ) {
        let mut cache = SelectCache::default();
        let mut other = DropdownController::new(context(), ControllerConfig::default());
        let mut picker = DropdownController::new(context(), ControllerConfig::default());
        let cmd = picker.open(&mut cache, Timestamp(0)).unwrap();

        for i in 0..resets {
            other.set_dependency(&mut cache, "university_id", FilterValue::Number(i as i64));
        }
        for _ in 0..invalidations {
            cache.invalidate_collection(Collection::DegreePrograms);
        }

        let done = picker.complete(
            &mut cache,
            cmd.token,
            PageOutcome::Page(PageResult::from_records(loaded.clone(), 10)),
            Timestamp(1),
        );
        if resets + invalidations == 0 {
            prop_assert_eq!(done, Completion::Applied(FetchKind::FirstPage));
            prop_assert!(!cache.is_stale(&context(), Timestamp(1)));
        } else {
            prop_assert_eq!(done, Completion::Discarded);
            prop_assert!(cache.peek(&context()).items.is_empty());
            prop_assert!(cache.is_stale(&context(), Timestamp(1)));
        }
    }
}
