//! Invariants of the loan ledger and codec over generated operation sequences.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use shelf_core::{ItemKind, Library, LibraryError, LoadPolicy, NewItem};

fn snapshot(library: &Library) -> String {
    library.encode().expect("library must encode")
}

fn kind_for(n: usize) -> ItemKind {
    match n % 3 {
        0 => ItemKind::General,
        1 => ItemKind::Fiction {
            genre: format!("Genre {n}"),
        },
        _ => ItemKind::NonFiction {
            subject: format!("Subject, part {n}"),
        },
    }
}

fn assert_loan_invariant(library: &Library) {
    let mut holders: HashMap<&str, usize> = HashMap::new();
    for member in library.members() {
        for item_id in member.held() {
            *holders.entry(item_id.as_str()).or_default() += 1;
        }
    }
    for item in library.items() {
        let count = holders.get(item.id()).copied().unwrap_or(0);
        if item.is_available() {
            assert_eq!(count, 0, "available item {} is held", item.id());
        } else {
            assert_eq!(count, 1, "unavailable item {} held {count} times", item.id());
        }
    }
}

fn assert_round_trip(library: &Library) {
    let encoded = snapshot(library);
    let (decoded, report) =
        Library::decode(&encoded, LoadPolicy::Abort).expect("encoded state must decode");
    assert!(report.skipped.is_empty());
    assert!(report.repaired.is_empty());
    assert_eq!(decoded.items(), library.items());
    assert_eq!(decoded.members(), library.members());

    let reencoded = snapshot(&decoded);
    assert_eq!(reencoded, encoded);
    let (again, _) = Library::decode(&reencoded, LoadPolicy::Abort).expect("re-decode");
    assert_eq!(snapshot(&again), reencoded);
}

fn run_sequence(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut library = Library::new();

    for step in 0..steps {
        let items = library.items().len();
        let members = library.members().len();
        let before = snapshot(&library);

        match rng.random_range(0..6) {
            0 => {
                let request = NewItem::new(kind_for(step), format!("Title {step}"), "Author");
                library.add_item(request).expect("add item");
            }
            1 => {
                library
                    .add_member(&format!("Reader {step}"), None)
                    .expect("add member");
            }
            op if items > 0 && members > 0 => {
                let item_id = library.items()[rng.random_range(0..items)].id().to_string();
                let member_id = library.members()[rng.random_range(0..members)].id().to_string();
                let was_available = library.item(&item_id).expect("item").is_available();
                let holder = library.holder_of(&item_id).map(|m| m.id().to_string());

                if op % 2 == 0 {
                    match library.borrow(&item_id, &member_id) {
                        Ok(()) => assert!(was_available),
                        Err(LibraryError::AlreadyBorrowed { .. }) => {
                            assert!(!was_available);
                            assert_eq!(snapshot(&library), before);
                        }
                        Err(other) => panic!("unexpected borrow failure: {other}"),
                    }
                } else {
                    match library.return_item(&item_id, &member_id) {
                        Ok(()) => assert_eq!(holder.as_deref(), Some(member_id.as_str())),
                        Err(LibraryError::NotBorrowed { .. }) => {
                            assert!(was_available);
                            assert_eq!(snapshot(&library), before);
                        }
                        Err(LibraryError::NotHeldByMember { .. }) => {
                            assert_ne!(holder.as_deref(), Some(member_id.as_str()));
                            assert_eq!(snapshot(&library), before);
                        }
                        Err(other) => panic!("unexpected return failure: {other}"),
                    }
                }
            }
            _ => {}
        }

        assert_loan_invariant(&library);
    }

    assert_round_trip(&library);
}

#[test]
fn invariants_hold_over_random_sequences() {
    for seed in 1..=40 {
        run_sequence(seed, 120);
    }
}

#[test]
fn intermediate_states_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut library = Library::new();
    for n in 0..6 {
        library
            .add_item(NewItem::new(kind_for(n), format!("\"Quoted\" {n}"), "A, B"))
            .expect("add item");
    }
    for n in 0..3 {
        library
            .add_member(&format!("Reader {n}"), None)
            .expect("add member");
    }
    for _ in 0..50 {
        let item_id = library.items()[rng.random_range(0..6)].id().to_string();
        let member_id = library.members()[rng.random_range(0..3)].id().to_string();
        let outcome = if rng.random_bool(0.5) {
            library.borrow(&item_id, &member_id)
        } else {
            library.return_item(&item_id, &member_id)
        };
        match outcome {
            Ok(())
            | Err(LibraryError::AlreadyBorrowed { .. })
            | Err(LibraryError::NotBorrowed { .. })
            | Err(LibraryError::NotHeldByMember { .. }) => {}
            Err(other) => panic!("unexpected ledger failure: {other}"),
        }
        assert_round_trip(&library);
    }
}

#[test]
fn return_by_another_member_leaves_state_unchanged() {
    let mut library = Library::new();
    let item = library
        .add_item(NewItem::new(ItemKind::General, "Cosmos", "Sagan"))
        .expect("add item");
    let alice = library.add_member("Alice", None).expect("alice");
    let bob = library.add_member("Bob", None).expect("bob");
    library.borrow(&item, &alice).expect("borrow");

    let before = snapshot(&library);
    let err = library.return_item(&item, &bob).unwrap_err();
    assert!(matches!(err, LibraryError::NotHeldByMember { .. }));
    assert_eq!(snapshot(&library), before);
}

#[test]
fn stored_flag_loses_to_held_set() {
    let input = "\
ITEM, FICTION, F1, Dune, Herbert, true, Sci-Fi
MEMBER, M1, Alice, F1
";
    let (library, report) = Library::decode(input, LoadPolicy::Abort).expect("decode");
    assert!(!library.item("F1").expect("F1").is_available());
    assert!(library.member("M1").expect("M1").holds("F1"));
    assert_eq!(report.repaired, vec!["F1".to_string()]);
    assert_loan_invariant(&library);
}
