//! Property tests for transition analysis, calendars and hierarchy resolution

use chrono::{DateTime, Duration, TimeZone, Utc};
use issueflow::issues::{
    analyze, Calendar, CategoryMap, ElapsedCalendar, HierarchyNode, HierarchyResolver,
    StatusEvent, WorkingHoursCalendar,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const STATUSES: [&str; 5] = ["1", "3", "5", "7", "9"];

fn categories() -> CategoryMap {
    // "9" has no category
    CategoryMap::new()
        .with("1", "backlog_time")
        .with("3", "in_progress_time")
        .with("5", "done_time")
        .with("7", "blocked_time")
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn calendar() -> WorkingHoursCalendar {
    WorkingHoursCalendar::new(9, 18, -180).unwrap()
}

fn events_strategy() -> impl Strategy<Value = Vec<StatusEvent>> {
    prop::collection::vec((0i64..40 * 24 * 60, 0usize..STATUSES.len()), 0..25).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(minutes, status)| {
                    StatusEvent::new(None, STATUSES[status], epoch() + Duration::minutes(minutes))
                })
                .collect()
        },
    )
}

fn distinct_events_strategy() -> impl Strategy<Value = Vec<StatusEvent>> {
    (
        prop::collection::btree_set(0i64..40 * 24 * 60, 0..20),
        prop::collection::vec(0usize..STATUSES.len(), 20),
    )
        .prop_map(|(minutes, statuses): (BTreeSet<i64>, Vec<usize>)| {
            minutes
                .into_iter()
                .zip(statuses)
                .map(|(m, s)| StatusEvent::new(None, STATUSES[s], epoch() + Duration::minutes(m)))
                .collect()
        })
}

proptest! {
    #[test]
    fn test_category_time_never_exceeds_span(events in events_strategy()) {
        let map = categories();
        let working = calendar();
        let calendars: [&dyn Calendar; 2] = [&ElapsedCalendar, &working];
        for cal in calendars {
            let metrics = analyze(Some(epoch()), &events, &map, cal);
            let first = events.iter().map(|e| e.occurred_at).min();
            let last = events.iter().map(|e| e.occurred_at).max();
            let span = match (first, last) {
                (Some(first), Some(last)) => cal.duration(first, last),
                _ => Default::default(),
            };
            prop_assert!(metrics.total_category_time() <= span);
        }
    }

    #[test]
    fn test_cycle_time_matches_milestones(events in events_strategy()) {
        let cal = calendar();
        let metrics = analyze(Some(epoch()), &events, &categories(), &cal);
        match (metrics.started_at, metrics.done_at) {
            (Some(started), Some(done)) => {
                prop_assert_eq!(metrics.cycle_time, Some(cal.duration(started, done)));
            }
            _ => prop_assert_eq!(metrics.cycle_time, None),
        }
        if metrics.started_at.is_some() {
            prop_assert_eq!(metrics.reaction_time, Some(cal.duration(epoch(), metrics.started_at.unwrap())));
        }
    }

    #[test]
    fn test_analysis_ignores_input_order(
        (events, shuffled) in distinct_events_strategy()
            .prop_flat_map(|events| (Just(events.clone()), Just(events).prop_shuffle()))
    ) {
        let cal = calendar();
        let map = categories();
        prop_assert_eq!(
            analyze(Some(epoch()), &events, &map, &cal),
            analyze(Some(epoch()), &shuffled, &map, &cal)
        );
    }

    #[test]
    fn test_working_hours_are_additive(a in 0i64..60 * 24 * 60, b in 0i64..60 * 24 * 60, c in 0i64..60 * 24 * 60) {
        let mut points = [a, b, c];
        points.sort_unstable();
        let at = |m: i64| epoch() + Duration::minutes(m);
        let cal = calendar();

        let whole = cal.duration(at(points[0]), at(points[2]));
        let parts = cal.duration(at(points[0]), at(points[1])) + cal.duration(at(points[1]), at(points[2]));
        prop_assert_eq!(whole, parts);
        prop_assert!(whole <= ElapsedCalendar.duration(at(points[0]), at(points[2])));
    }

    #[test]
    fn test_hierarchy_resolution_terminates(
        parents in prop::collection::vec(prop::option::of(0usize..30), 1..30),
        types in prop::collection::vec(0usize..6, 30)
    ) {
        const TYPES: [&str; 6] = ["Objective", "Key Result", "Initiative", "Epic", "Story", "Task"];
        let keys: Vec<String> = (0..parents.len()).map(|i| format!("N-{}", i)).collect();
        let nodes: Vec<HierarchyNode> = parents
            .iter()
            .enumerate()
            .map(|(i, parent)| {
                let parent_key = parent.map(|p| format!("N-{}", p));
                HierarchyNode::new(&keys[i], TYPES[types[i]], parent_key.as_deref())
            })
            .collect();
        let resolver = HierarchyResolver::new(nodes);

        for key in &keys {
            let ancestry = resolver.resolve(key);
            for found in [
                &ancestry.objective,
                &ancestry.key_result,
                &ancestry.initiative,
                &ancestry.epic,
                &ancestry.story,
            ]
            .into_iter()
            .flatten()
            {
                prop_assert_ne!(found, key);
                prop_assert!(keys.contains(found));
            }
        }
    }
}
