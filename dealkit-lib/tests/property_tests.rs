//! Property-based tests for the deal lifecycle
//!
//! These tests use proptest to drive random event sequences through the state
//! machine and check the deal invariants after every step.

#[cfg(test)]
mod lifecycle_properties {
    use dealkit_lib::lifecycle::evaluate;
    use dealkit_lib::{
        Amount, Category, Deal, DealEvent, DealId, DealStatus, TransitionErrorKind, UserId,
    };
    use proptest::prelude::*;

    const SELLER: UserId = UserId(1);
    // Seller, two would-be buyers and an outsider.
    const ACTORS: [UserId; 4] = [UserId(1), UserId(2), UserId(3), UserId(4)];

    fn fresh_deal() -> Deal {
        Deal::new(
            DealId::parse("prop").unwrap(),
            SELLER,
            Category::Nft,
            "item".to_string(),
            String::new(),
            Amount::parse_user_input("100.0").unwrap(),
            0,
        )
    }

    fn step() -> impl Strategy<Value = (DealEvent, UserId)> {
        (
            prop::sample::select(DealEvent::ALL.to_vec()),
            prop::sample::select(ACTORS.to_vec()),
        )
    }

    fn assert_invariants(deal: &Deal) -> Result<(), TestCaseError> {
        prop_assert!(DealStatus::ALL.contains(&deal.status));
        prop_assert_eq!(deal.seller_id, SELLER);
        prop_assert_ne!(deal.buyer_id, Some(SELLER));
        match deal.status {
            DealStatus::Created => {
                prop_assert_eq!(deal.buyer_id, None);
            }
            DealStatus::WaitingPayment | DealStatus::Paid | DealStatus::Finished => {
                prop_assert!(deal.buyer_id.is_some());
            }
            DealStatus::Canceled => {}
        }
        Ok(())
    }

    proptest! {
        /// Any event sequence keeps the deal well-formed
        #[test]
        fn random_sequences_preserve_invariants(steps in prop::collection::vec(step(), 0..40)) {
            let mut deal = fresh_deal();
            for (i, (event, actor)) in steps.into_iter().enumerate() {
                let before = deal.clone();
                match evaluate(&deal, event, actor) {
                    Ok(transition) => {
                        prop_assert_eq!(transition.from, before.status);
                        transition.apply(&mut deal, i as i64 + 1);
                        prop_assert_eq!(deal.updated_at, i as i64 + 1);
                    }
                    Err(_) => {
                        prop_assert_eq!(&deal, &before);
                    }
                }
                assert_invariants(&deal)?;
            }
        }

        /// Finish succeeds only from paid
        #[test]
        fn finish_only_from_paid(steps in prop::collection::vec(step(), 0..40)) {
            let mut deal = fresh_deal();
            for (event, actor) in steps {
                let status = deal.status;
                if let Ok(transition) = evaluate(&deal, event, actor) {
                    if event == DealEvent::Finish {
                        prop_assert_eq!(status, DealStatus::Paid);
                    }
                    transition.apply(&mut deal, 1);
                }
            }
        }

        /// Joining a deal that already has a buyer is always invalid-state
        #[test]
        fn join_with_buyer_set_is_invalid_state(
            steps in prop::collection::vec(step(), 0..40),
            joiner in prop::sample::select(vec![UserId(2), UserId(3), UserId(4)]),
        ) {
            let mut deal = fresh_deal();
            for (event, actor) in steps {
                if let Ok(transition) = evaluate(&deal, event, actor) {
                    transition.apply(&mut deal, 1);
                }
                if deal.buyer_id.is_some() {
                    let err = evaluate(&deal, DealEvent::Join, joiner).unwrap_err();
                    prop_assert_eq!(err.kind(), TransitionErrorKind::InvalidState);
                }
            }
        }

        /// The seller is refused on role before state is ever considered
        #[test]
        fn seller_join_is_always_forbidden(steps in prop::collection::vec(step(), 0..40)) {
            let mut deal = fresh_deal();
            for (event, actor) in steps {
                let err = evaluate(&deal, DealEvent::Join, SELLER).unwrap_err();
                prop_assert_eq!(err.kind(), TransitionErrorKind::ForbiddenRole);
                if let Ok(transition) = evaluate(&deal, event, actor) {
                    transition.apply(&mut deal, 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod engine_properties {
    use dealkit_lib::lifecycle::evaluate;
    use dealkit_lib::{
        Amount, Category, DealEngine, DealEvent, DealStore, MemoryStore, SaltedCounterIds, UserId,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// The persisted deal always matches the pure state machine
        #[test]
        fn engine_matches_pure_model(
            steps in prop::collection::vec(
                (
                    prop::sample::select(DealEvent::ALL.to_vec()),
                    prop::sample::select(vec![UserId(1), UserId(2), UserId(3)]),
                ),
                0..25,
            )
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let store = Arc::new(MemoryStore::new());
                let engine = DealEngine::with_id_generator(store.clone(), Arc::new(SaltedCounterIds::new()));
                engine.set_wallet(UserId(1), "UQ-seller").await.unwrap();
                let id = engine
                    .create_deal(
                        UserId(1),
                        Amount::parse_user_input("7").unwrap(),
                        Category::Other,
                        "thing",
                        "",
                    )
                    .await
                    .unwrap();
                let mut model = engine.get_deal(&id).await.unwrap();

                for (event, actor) in steps {
                    let expected = evaluate(&model, event, actor);
                    let actual = engine.apply_transition(&id, event, actor).await;
                    match (expected, actual) {
                        (Ok(transition), Ok(outcome)) => {
                            transition.apply(&mut model, outcome.deal.updated_at);
                            prop_assert_eq!(&outcome.deal, &model);
                            prop_assert!(!outcome.notifications.is_empty());
                        }
                        (Err(expected), Err(actual)) => {
                            prop_assert_eq!(Some(expected.kind()), actual.transition_kind());
                        }
                        (expected, actual) => {
                            prop_assert!(false, "model {:?} but engine {:?}", expected, actual.map(|o| o.deal));
                        }
                    }
                    let persisted = store.get_deal(&id).await.unwrap();
                    prop_assert_eq!(persisted.as_ref(), Some(&model));
                }
                Ok(())
            })?;
        }
    }
}
