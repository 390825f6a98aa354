mod common;

use chrono::Utc;
use kingdom_battles::db;
use kingdom_battles::testutil::{
    age_resolution, end_pledge_phase, seed_kingdom, seed_player, set_reputation, set_ruler_since,
};
use kingdom_battles::{BattleError, BattleKind, EligibilityReason, Side};

#[tokio::test]
#[ignore]
async fn initiating_a_coup_opens_a_pledging_battle() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;

    let battle_id = engine.initiate_coup(rebel, kingdom).await.unwrap();

    let battle = db::battles::fetch(&pool, battle_id).await.unwrap().unwrap();
    assert_eq!(battle.kind, BattleKind::Coup);
    assert_eq!(battle.kingdom_id, kingdom);
    assert_eq!(battle.attacking_from_kingdom_id, None);
    assert_eq!(battle.attacker_ids, vec![rebel], "initiator pledges as the first attacker");
    assert!(battle.defender_ids.is_empty());
    assert_eq!(
        battle.pledge_end_time - battle.start_time,
        chrono::Duration::hours(24)
    );

    let view = engine.battle_view(battle_id, rebel).await.unwrap();
    assert_eq!(view.kind, "coup");
    assert_eq!(view.phase, "pledge");
    assert_eq!(view.kingdom_name, "Varnholm");
    assert_eq!(view.initiator_name, "rebel");
    assert!(view.started_at.ends_with(" UTC"), "got {}", view.started_at);
    assert!(view.pledge_ends_at.ends_with(" UTC"));
    assert_eq!(view.resolved_at, None);
    assert_eq!(view.winner_side, None);
    assert_eq!(view.territories.len(), 3);
    for t in &view.territories {
        assert_eq!(t.control_bar, 50.0, "{} should start at the midpoint", t.name);
        assert_eq!(t.captured_by, None);
    }
    assert_eq!(view.viewer.side.as_deref(), Some("attackers"));
    assert_eq!(view.viewer.swing_ready_in_secs, 0);
    assert_eq!(view.viewer.injured_for_secs, 0);
}

#[tokio::test]
#[ignore]
async fn an_invasion_contests_five_territories_over_a_longer_pledge() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let target_ruler = seed_player(&pool, "target_ruler", 100, 5.0, 5.0, 5.0).await;
    let target = seed_kingdom(&pool, "Varnholm", Some(target_ruler), 1000, 2).await;
    let warlord = seed_player(&pool, "warlord", 100, 5.0, 5.0, 5.0).await;
    let homeland = seed_kingdom(&pool, "Eastmarch", Some(warlord), 500, 0).await;

    let battle_id = engine
        .declare_invasion(warlord, homeland, target)
        .await
        .unwrap();

    let battle = db::battles::fetch(&pool, battle_id).await.unwrap().unwrap();
    assert_eq!(battle.kind, BattleKind::Invasion);
    assert_eq!(battle.attacking_from_kingdom_id, Some(homeland));
    assert_eq!(
        battle.pledge_end_time - battle.start_time,
        chrono::Duration::hours(48)
    );

    let view = engine.battle_view(battle_id, warlord).await.unwrap();
    assert_eq!(view.kind, "invasion");
    assert_eq!(view.attacking_from_kingdom_name.as_deref(), Some("Eastmarch"));
    assert_eq!(view.territories.len(), 5);
}

#[tokio::test]
#[ignore]
async fn coup_thresholds_are_enforced() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 50.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;

    // The sitting ruler cannot rise against their own crown.
    set_reputation(&pool, ruler, kingdom, 100.0).await;
    let err = engine.initiate_coup(ruler, kingdom).await.unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::AlreadyRuler)
    ));

    // Leadership below the bar.
    let meek = seed_player(&pool, "meek", 100, 5.0, 5.0, 3.0).await;
    set_reputation(&pool, meek, kingdom, 90.0).await;
    let err = engine.initiate_coup(meek, kingdom).await.unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::LeadershipTooLow { .. })
    ));

    // Unknown in the kingdom.
    let stranger = seed_player(&pool, "stranger", 100, 5.0, 5.0, 15.0).await;
    let err = engine.initiate_coup(stranger, kingdom).await.unwrap_err();
    match err {
        BattleError::Ineligible(EligibilityReason::ReputationTooLow { required, actual }) => {
            assert_eq!(required, 50.0);
            assert_eq!(actual, 0.0, "a player with no history starts at zero");
        }
        other => panic!("expected reputation refusal, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn pledging_fills_rosters_and_rejects_double_joins() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;
    let battle_id = engine.initiate_coup(rebel, kingdom).await.unwrap();

    let loyalist = seed_player(&pool, "loyalist", 100, 5.0, 5.0, 5.0).await;
    set_reputation(&pool, loyalist, kingdom, 40.0).await;
    engine
        .join_battle(battle_id, loyalist, Side::Defenders)
        .await
        .unwrap();

    // Same side again.
    let err = engine
        .join_battle(battle_id, loyalist, Side::Defenders)
        .await
        .unwrap_err();
    assert!(matches!(err, BattleError::AlreadyPledged { .. }));

    // Switching sides is just as refused.
    let err = engine
        .join_battle(battle_id, loyalist, Side::Attackers)
        .await
        .unwrap_err();
    assert!(matches!(err, BattleError::AlreadyPledged { .. }));

    let battle = db::battles::fetch(&pool, battle_id).await.unwrap().unwrap();
    assert_eq!(battle.attacker_ids, vec![rebel]);
    assert_eq!(battle.defender_ids, vec![loyalist]);
}

#[tokio::test]
#[ignore]
async fn joining_needs_standing_with_the_contested_kingdom() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;
    let battle_id = engine.initiate_coup(rebel, kingdom).await.unwrap();

    let nobody = seed_player(&pool, "nobody", 100, 5.0, 5.0, 5.0).await;
    let err = engine
        .join_battle(battle_id, nobody, Side::Attackers)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::ReputationTooLow { .. })
    ));
}

#[tokio::test]
#[ignore]
async fn the_pledge_window_closes_joins_but_not_views() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;
    let battle_id = engine.initiate_coup(rebel, kingdom).await.unwrap();

    end_pledge_phase(&pool, battle_id).await;

    let latecomer = seed_player(&pool, "latecomer", 100, 5.0, 5.0, 5.0).await;
    set_reputation(&pool, latecomer, kingdom, 40.0).await;
    let err = engine
        .join_battle(battle_id, latecomer, Side::Defenders)
        .await
        .unwrap_err();
    assert!(matches!(err, BattleError::WrongPhase { .. }));

    let view = engine.battle_view(battle_id, latecomer).await.unwrap();
    assert_eq!(view.phase, "battle");
    assert_eq!(view.viewer.side, None);
}

#[tokio::test]
#[ignore]
async fn a_player_cannot_straddle_two_battles() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler_a = seed_player(&pool, "ruler_a", 100, 5.0, 5.0, 5.0).await;
    let kingdom_a = seed_kingdom(&pool, "Varnholm", Some(ruler_a), 1000, 0).await;
    let ruler_b = seed_player(&pool, "ruler_b", 100, 5.0, 5.0, 5.0).await;
    let kingdom_b = seed_kingdom(&pool, "Westvale", Some(ruler_b), 1000, 0).await;

    let rebel_a = seed_player(&pool, "rebel_a", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel_a, kingdom_a, 60.0).await;
    let battle_a = engine.initiate_coup(rebel_a, kingdom_a).await.unwrap();
    let rebel_b = seed_player(&pool, "rebel_b", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel_b, kingdom_b, 60.0).await;
    let battle_b = engine.initiate_coup(rebel_b, kingdom_b).await.unwrap();

    let sellsword = seed_player(&pool, "sellsword", 100, 5.0, 5.0, 5.0).await;
    set_reputation(&pool, sellsword, kingdom_a, 40.0).await;
    set_reputation(&pool, sellsword, kingdom_b, 40.0).await;
    engine
        .join_battle(battle_a, sellsword, Side::Attackers)
        .await
        .unwrap();

    let err = engine
        .join_battle(battle_b, sellsword, Side::Defenders)
        .await
        .unwrap_err();
    match err {
        BattleError::Ineligible(EligibilityReason::AlreadyInBattle { battle_id }) => {
            assert_eq!(battle_id, battle_a);
        }
        other => panic!("expected already-in-battle refusal, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn a_busy_kingdom_rejects_every_new_battle() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let target_ruler = seed_player(&pool, "target_ruler", 100, 5.0, 5.0, 5.0).await;
    let target = seed_kingdom(&pool, "Varnholm", Some(target_ruler), 1000, 0).await;
    let warlord = seed_player(&pool, "warlord", 100, 5.0, 5.0, 5.0).await;
    let homeland = seed_kingdom(&pool, "Eastmarch", Some(warlord), 500, 0).await;
    let bystander_ruler = seed_player(&pool, "bystander_ruler", 100, 5.0, 5.0, 5.0).await;
    let bystander = seed_kingdom(&pool, "Westvale", Some(bystander_ruler), 800, 0).await;

    engine
        .declare_invasion(warlord, homeland, target)
        .await
        .unwrap();

    // The target kingdom is locked while the invasion is unresolved.
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, target, 60.0).await;
    let err = engine.initiate_coup(rebel, target).await.unwrap_err();
    match err {
        BattleError::Ineligible(EligibilityReason::KingdomBusy { kingdom_id }) => {
            assert_eq!(kingdom_id, target);
        }
        other => panic!("expected busy refusal, got {other:?}"),
    }

    // So is the attacking kingdom, even toward a third party.
    let err = engine
        .declare_invasion(warlord, homeland, bystander)
        .await
        .unwrap_err();
    match err {
        BattleError::Ineligible(EligibilityReason::KingdomBusy { kingdom_id }) => {
            assert_eq!(kingdom_id, homeland);
        }
        other => panic!("expected busy refusal, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn the_rematch_buffer_shields_a_kingdom_after_resolution() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;
    let battle_id = engine.initiate_coup(rebel, kingdom).await.unwrap();
    assert!(
        db::battles::claim_resolution(&pool, battle_id, Side::Defenders, Utc::now())
            .await
            .unwrap()
    );

    let second = seed_player(&pool, "second", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, second, kingdom, 60.0).await;
    let err = engine.initiate_coup(second, kingdom).await.unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::RecentBattle { .. })
    ));

    // Once the last battle is old enough the kingdom is fair game again.
    age_resolution(&pool, battle_id, 8).await;
    engine.initiate_coup(second, kingdom).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn initiators_carry_a_cooldown_between_battles() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler_a = seed_player(&pool, "ruler_a", 100, 5.0, 5.0, 5.0).await;
    let kingdom_a = seed_kingdom(&pool, "Varnholm", Some(ruler_a), 1000, 0).await;
    let ruler_b = seed_player(&pool, "ruler_b", 100, 5.0, 5.0, 5.0).await;
    let kingdom_b = seed_kingdom(&pool, "Westvale", Some(ruler_b), 1000, 0).await;

    let serial_rebel = seed_player(&pool, "serial_rebel", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, serial_rebel, kingdom_a, 60.0).await;
    set_reputation(&pool, serial_rebel, kingdom_b, 60.0).await;

    let battle_id = engine.initiate_coup(serial_rebel, kingdom_a).await.unwrap();
    assert!(
        db::battles::claim_resolution(&pool, battle_id, Side::Defenders, Utc::now())
            .await
            .unwrap()
    );
    age_resolution(&pool, battle_id, 8).await;

    let err = engine.initiate_coup(serial_rebel, kingdom_b).await.unwrap_err();
    match err {
        BattleError::Ineligible(EligibilityReason::InitiatorCooldown { remaining_secs }) => {
            assert!(remaining_secs > 0, "cooldown should have time left");
        }
        other => panic!("expected initiator cooldown, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn a_fresh_ruler_is_protected_from_invasion() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let target_ruler = seed_player(&pool, "target_ruler", 100, 5.0, 5.0, 5.0).await;
    let target = seed_kingdom(&pool, "Varnholm", Some(target_ruler), 1000, 0).await;
    let warlord = seed_player(&pool, "warlord", 100, 5.0, 5.0, 5.0).await;
    let homeland = seed_kingdom(&pool, "Eastmarch", Some(warlord), 500, 0).await;

    set_ruler_since(&pool, target, Utc::now() - chrono::Duration::days(1)).await;
    let err = engine
        .declare_invasion(warlord, homeland, target)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::RulerTenureProtected { .. })
    ));

    set_ruler_since(&pool, target, Utc::now() - chrono::Duration::days(20)).await;
    engine
        .declare_invasion(warlord, homeland, target)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn invasions_demand_the_attacking_crown() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let target_ruler = seed_player(&pool, "target_ruler", 100, 5.0, 5.0, 5.0).await;
    let target = seed_kingdom(&pool, "Varnholm", Some(target_ruler), 1000, 0).await;
    let warlord = seed_player(&pool, "warlord", 100, 5.0, 5.0, 5.0).await;
    let homeland = seed_kingdom(&pool, "Eastmarch", Some(warlord), 500, 0).await;

    let commoner = seed_player(&pool, "commoner", 100, 5.0, 5.0, 5.0).await;
    let err = engine
        .declare_invasion(commoner, homeland, target)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::NotRuler { .. })
    ));

    let err = engine
        .declare_invasion(warlord, homeland, homeland)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BattleError::Ineligible(EligibilityReason::SelfInvasion)
    ));
}

#[tokio::test]
#[ignore]
async fn unknown_ids_are_reported_by_name() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;

    let err = engine.initiate_coup(424242, kingdom).await.unwrap_err();
    assert!(matches!(err, BattleError::UnknownPlayer(424242)));

    let err = engine.initiate_coup(ruler, 424242).await.unwrap_err();
    assert!(matches!(err, BattleError::UnknownKingdom(424242)));

    let err = engine.battle_view(424242, ruler).await.unwrap_err();
    assert!(matches!(err, BattleError::UnknownBattle(424242)));
}

#[tokio::test]
#[ignore]
async fn the_kingdom_feed_announces_declarations() {
    let (pool, _container) = common::setup().await;
    let engine = common::engine(&pool);

    let ruler = seed_player(&pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom = seed_kingdom(&pool, "Varnholm", Some(ruler), 1000, 0).await;
    let rebel = seed_player(&pool, "Aldric", 100, 5.0, 5.0, 15.0).await;
    set_reputation(&pool, rebel, kingdom, 60.0).await;
    engine.initiate_coup(rebel, kingdom).await.unwrap();

    let feed = engine.kingdom_feed(kingdom, 10).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(
        feed[0].message,
        "Aldric has risen against the crown of Varnholm"
    );
    assert_eq!(feed[0].kingdom_id, kingdom);
}
