use clubcore::{filter, sort, Cohort, FilterSet, Predicate, Record, RecordDraft, SortKey, Value};
use proptest::prelude::*;

const POSITIONS: [&str; 4] = ["goalkeeper", "defender", "midfield", "forward"];

fn athlete(name: &str, position: &str, skill: f64) -> Record {
    Record::new(
        RecordDraft::new()
            .with("name", name)
            .with("position", position)
            .with("skill", skill)
            .attributes,
    )
}

fn any_cohort() -> impl Strategy<Value = Cohort> {
    let record = (
        "[a-z]{1,6}",
        prop::sample::select(POSITIONS.to_vec()),
        prop::option::of(0.0_f64..100.0),
    )
        .prop_map(|(name, position, skill)| {
            let mut draft = RecordDraft::new().with("name", name).with("position", position);
            if let Some(skill) = skill {
                draft = draft.with("skill", skill);
            }
            Record::new(draft.attributes)
        });
    prop::collection::vec(record, 0..25).prop_map(|records| records.into_iter().collect())
}

fn any_clause() -> impl Strategy<Value = (String, Predicate)> {
    prop_oneof![
        (0.0_f64..100.0, 0.0_f64..100.0)
            .prop_map(|(a, b)| ("skill".to_string(), Predicate::range(a.min(b), a.max(b)))),
        prop::sample::select(POSITIONS.to_vec())
            .prop_map(|p| ("position".to_string(), Predicate::Equals(Value::from(p)))),
        "[a-z]{0,2}".prop_map(|s| ("name".to_string(), Predicate::Contains(s))),
        prop::sample::subsequence(POSITIONS.to_vec(), 0..=4).prop_map(|set| {
            (
                "position".to_string(),
                Predicate::OneOf(set.into_iter().map(Value::from).collect()),
            )
        }),
        Just(("name".to_string(), Predicate::Matches("^[a-m]".to_string()))),
    ]
}

fn filter_set(clauses: &[(String, Predicate)]) -> FilterSet {
    clauses
        .iter()
        .cloned()
        .fold(FilterSet::new(), |set, (field, predicate)| set.and(field, predicate))
}

proptest! {
    #[test]
    fn adding_a_clause_never_grows_the_result(
        cohort in any_cohort(),
        base in prop::collection::vec(any_clause(), 0..3),
        extra in any_clause(),
    ) {
        let narrow: Vec<_> = base.iter().cloned().chain(std::iter::once(extra)).collect();
        let wide = filter(&cohort, &filter_set(&base)).unwrap();
        let tight = filter(&cohort, &filter_set(&narrow)).unwrap();

        prop_assert!(tight.len() <= wide.len());
        for record in &tight {
            prop_assert!(wide.contains(record.id));
        }
    }

    #[test]
    fn sort_is_a_permutation(cohort in any_cohort(), descending in any::<bool>()) {
        let key = if descending { SortKey::desc("skill") } else { SortKey::asc("skill") };
        let sorted = sort(&cohort, &[key]);
        prop_assert_eq!(sorted.len(), cohort.len());
        for record in &sorted {
            prop_assert!(cohort.contains(record.id));
        }

        // Records without a skill value always trail.
        let first_missing = sorted.iter().position(|r| r.number("skill").is_none());
        if let Some(idx) = first_missing {
            prop_assert!(sorted[idx..].iter().all(|r| r.number("skill").is_none()));
        }
    }
}

#[test]
fn empty_filter_set_returns_full_cohort() {
    let cohort: Cohort = vec![
        athlete("ana", "forward", 70.0),
        athlete("ben", "defender", 55.0),
    ]
    .into_iter()
    .collect();
    assert_eq!(filter(&cohort, &FilterSet::new()).unwrap(), cohort);
}

#[test]
fn combined_filter_then_sort() {
    let cohort: Cohort = vec![
        athlete("ana", "forward", 70.0),
        athlete("ben", "defender", 55.0),
        athlete("cai", "forward", 82.0),
        athlete("dee", "forward", 40.0),
    ]
    .into_iter()
    .collect();

    let filters = FilterSet::new()
        .and("position", Predicate::Equals(Value::from("forward")))
        .and("skill", Predicate::Range { min: Some(50.0), max: None });
    let records = sort(&filter(&cohort, &filters).unwrap(), &[SortKey::desc("skill")]);
    let names: Vec<_> = records.iter().filter_map(|r| r.text("name")).collect();
    assert_eq!(names, vec!["cai", "ana"]);
}

#[test]
fn invalid_regex_is_rejected() {
    let cohort: Cohort = std::iter::once(athlete("ana", "forward", 70.0)).collect();
    let err = filter(&cohort, &FilterSet::new().and("name", Predicate::Matches("(".into())))
        .unwrap_err();
    assert!(err.is_validation());
}
