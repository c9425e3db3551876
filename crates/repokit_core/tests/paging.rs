mod common;

use common::{setup_uow, Customer};
use repokit_core::{FieldValue, Predicate, SortDirection, UnitOfWork};

fn seeded_uow(rows: i64) -> UnitOfWork {
    let mut uow = setup_uow();
    let repo = uow.repository::<Customer>().unwrap();
    for id in 1..=rows {
        let mut customer = Customer::new(id, &format!("customer-{id:02}"));
        customer.score = Some(id as f64);
        repo.add(&mut customer).unwrap();
    }
    uow.save_changes().unwrap();
    uow
}

#[test]
fn ascending_page_is_ordered_and_capped_at_take_plus_skip() {
    let uow = seeded_uow(10);
    let repo = uow.repository::<Customer>().unwrap();

    let page = repo
        .get_data_part(&Predicate::All, "id", SortDirection::Ascending, 2, 3)
        .unwrap();

    // The skip is accepted but never applied server-side: the page starts
    // at the first row and is capped at take + skip.
    assert_eq!(page.len(), 5);
    let ids: Vec<i64> = page.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    // Callers perform the skip client-side on the returned sequence.
    let visible: Vec<i64> = page.iter().skip(2).map(|c| c.id).collect();
    assert_eq!(visible, vec![3, 4, 5]);
}

#[test]
fn descending_page_bypasses_ordering_and_keeps_the_cap() {
    let uow = seeded_uow(10);
    let repo = uow.repository::<Customer>().unwrap();

    let page = repo
        .get_data_part(&Predicate::All, "id", SortDirection::Descending, 2, 2)
        .unwrap();

    // No ORDER BY is emitted in this branch; only the row cap applies.
    assert_eq!(page.len(), 4);

    let unknown_sort = repo
        .get_data_part(&Predicate::All, "ghost", SortDirection::Descending, 0, 3)
        .unwrap();
    assert_eq!(
        unknown_sort.len(),
        3,
        "the sort column is never translated in the descending branch"
    );
}

#[test]
fn page_cap_applies_after_filtering() {
    let uow = seeded_uow(10);
    let repo = uow.repository::<Customer>().unwrap();

    let filter = Predicate::gt("score", FieldValue::Real(4.0));
    let page = repo
        .get_data_part(&filter, "score", SortDirection::Ascending, 1, 2)
        .unwrap();

    assert_eq!(page.len(), 3);
    let ids: Vec<i64> = page.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![5, 6, 7]);
}

#[test]
fn short_result_sets_return_everything_under_the_cap() {
    let uow = seeded_uow(3);
    let repo = uow.repository::<Customer>().unwrap();

    let ascending = repo
        .get_data_part(&Predicate::All, "id", SortDirection::Ascending, 5, 10)
        .unwrap();
    assert_eq!(ascending.len(), 3);

    let descending = repo
        .get_data_part(&Predicate::All, "id", SortDirection::Descending, 5, 10)
        .unwrap();
    assert_eq!(descending.len(), 3);
}
