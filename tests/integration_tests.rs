//! Integration tests for the party-queue service
//!
//! These tests drive the whole system through `GroupApi`:
//! - Party formation and privacy-gated joins
//! - Queueing, draining and promotion into started matches
//! - Partial promotion when an ordered store call fails
//! - Concurrent join and enqueue handling

mod fixtures;

use futures::future::join_all;
use party_queue::types::{GroupKind, Privacy, QueueSize};
use std::collections::HashSet;
use std::time::Duration;

use fixtures::TestSystem;

#[tokio::test]
async fn test_complete_squad_workflow() {
    let system = TestSystem::new();
    let (a, b, c, d) = (1, 2, 3, 4);

    system.party(a, &[b]);
    system.party(c, &[]);
    assert_eq!(system.members(GroupKind::Party, b), vec![a, b]);

    assert!(system.api.enqueue_for_match(a, 4).await);
    assert!(system.api.enqueue_for_match(c, 4).await);

    // Three queued participants cannot fill a squad
    assert!(system.publisher.get_published_events().is_empty());
    assert_eq!(system.api.queued_size(a).await, Some(QueueSize::Squad));
    assert_eq!(system.api.queued_size(c).await, Some(QueueSize::Squad));

    system.party(d, &[]);
    assert!(system.api.enqueue_for_match(d, 4).await);

    let events = system.publisher.get_published_events();
    assert_eq!(events.len(), 1);
    let formed = &events[0];
    assert_eq!(formed.leader, d);
    assert_eq!(formed.party_leaders, vec![d, c, a]);
    assert_eq!(formed.members, vec![a, b, c, d]);
    assert!(!formed.under_filled);

    // Everyone left their party and is sealed into the started match
    for participant in [a, b, c, d] {
        assert!(system.api.get_group(GroupKind::Party, participant).is_none());
        assert_eq!(system.members(GroupKind::Match, participant), vec![a, b, c, d]);
        assert_eq!(system.api.queued_size(participant).await, None);
    }
    let game = system.api.get_group(GroupKind::Match, d).unwrap();
    assert_eq!(game.started, Some(true));

    system.api.connect(5);
    assert!(!system
        .api
        .request_join_group(GroupKind::Match, 5, d, None));

    let stats = system.app.stats().await.unwrap();
    assert_eq!(stats.matches_formed, 1);
    assert_eq!(stats.active_matches, 1);
    assert_eq!(stats.queued_parties, 0);
}

#[tokio::test]
async fn test_duo_queue_pairs_solo_parties() {
    let system = TestSystem::new();
    for participant in 1..=5 {
        system.party(participant, &[]);
        assert!(system.api.enqueue_for_match(participant, 2).await);
    }

    let events = system.publisher.get_published_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].members, vec![1, 2]);
    assert_eq!(events[1].members, vec![3, 4]);
    assert_eq!(system.api.queued_size(5).await, Some(QueueSize::Duo));
}

#[tokio::test]
async fn test_participants_queue_again_after_a_match() {
    let system = TestSystem::new();
    system.party(1, &[]);
    system.party(2, &[]);
    assert!(system.api.enqueue_for_match(1, 2).await);
    assert!(system.api.enqueue_for_match(2, 2).await);
    assert_eq!(system.publisher.get_published_events().len(), 1);

    // Back from the game: fresh parties, same queue
    assert!(system.api.connect(1));
    assert!(system.api.connect(2));
    assert!(system.api.enqueue_for_match(1, 2).await);
    assert!(system.api.enqueue_for_match(2, 2).await);

    let events = system.publisher.get_published_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].members, vec![1, 2]);
    assert_ne!(events[0].match_id, events[1].match_id);
    for participant in [1, 2] {
        assert_eq!(system.api.queued_size(participant).await, None);
        assert_eq!(system.members(GroupKind::Match, participant), vec![1, 2]);
    }
    assert_eq!(system.app.stats().await.unwrap().active_matches, 1);
}

#[tokio::test]
async fn test_failed_leader_dequeue_keeps_queue_intact() {
    let system = TestSystem::new();
    system.party(1, &[]);
    system.party(2, &[]);
    system.duo_store.fail_removes_for(1);
    system.duo_store.fail_removes_for(2);

    assert!(system.api.enqueue_for_match(1, 2).await);
    assert!(system.api.enqueue_for_match(2, 2).await);

    assert!(system.publisher.get_published_events().is_empty());
    for participant in [1, 2] {
        assert_eq!(system.api.queued_size(participant).await, Some(QueueSize::Duo));
        assert!(system.api.get_group(GroupKind::Match, participant).is_none());
        assert!(system.api.is_leader(GroupKind::Party, participant));
    }

    system.duo_store.heal();
    let outcome = system.app.queue().trigger_drain(QueueSize::Duo).await;
    let formed = outcome.and_then(|o| o.formed().cloned()).unwrap();
    assert_eq!(formed.members, vec![1, 2]);
    assert!(system.duo_store.stored_participants().is_empty());
}

#[tokio::test]
async fn test_oversized_party_never_matches() {
    let system = TestSystem::new();
    system.party(1, &[2, 3]);
    assert!(system.api.enqueue_for_match(1, 2).await);

    assert!(system.publisher.get_published_events().is_empty());
    assert_eq!(system.api.queued_size(1).await, Some(QueueSize::Duo));

    assert!(!system.api.enqueue_for_match(1, 4).await);
    assert!(system.api.dequeue_from_match(1).await);
    assert!(system.api.enqueue_for_match(1, 4).await);
}

#[tokio::test]
async fn test_vanished_party_leaves_match_under_filled() {
    let system = TestSystem::new();
    system.party(1, &[2]);
    system.party(3, &[]);
    system.party(4, &[]);

    assert!(system.api.enqueue_for_match(1, 4).await);
    assert!(system.api.enqueue_for_match(3, 4).await);
    system.squad_store.fail_removes_for(3);
    assert!(system.api.enqueue_for_match(4, 4).await);

    let events = system.publisher.get_published_events();
    assert_eq!(events.len(), 1);
    let formed = &events[0];
    assert_eq!(formed.leader, 4);
    assert_eq!(formed.party_leaders, vec![4, 1]);
    assert_eq!(formed.members, vec![1, 2, 4]);
    assert!(formed.under_filled);

    // The skipped party keeps its queue entry and its party
    assert_eq!(system.api.queued_size(3).await, Some(QueueSize::Squad));
    assert!(system.api.is_leader(GroupKind::Party, 3));
    assert_eq!(system.squad_store.stored_participants(), vec![3]);

    system.squad_store.heal();
    assert!(system.api.dequeue_from_match(3).await);
    assert!(system.squad_store.stored_participants().is_empty());
}

#[tokio::test]
async fn test_failed_store_write_leaves_participant_unqueued() {
    let system = TestSystem::new();
    system.party(1, &[]);
    system.duo_store.fail_puts_for(1);

    assert!(!system.api.enqueue_for_match(1, 2).await);
    assert_eq!(system.api.queued_size(1).await, None);

    system.duo_store.heal();
    assert!(system.api.enqueue_for_match(1, 2).await);
    assert_eq!(system.api.queued_size(1).await, Some(QueueSize::Duo));
}

#[tokio::test]
async fn test_unknown_queue_size_is_rejected() {
    let system = TestSystem::new();
    system.party(1, &[]);

    assert!(!system.api.enqueue_for_match(1, 3).await);
    assert_eq!(system.api.queued_size(1).await, None);
}

#[tokio::test]
async fn test_privacy_and_kick_through_api() {
    let system = TestSystem::new();
    system.party(1, &[]);
    for participant in 2..=5 {
        system.api.connect(participant);
    }

    assert!(system
        .api
        .set_group_privacy(GroupKind::Party, 1, Privacy::Password, Some("hunter2".to_string())));
    assert!(!system
        .api
        .request_join_group(GroupKind::Party, 2, 1, Some("wrong")));
    assert!(system
        .api
        .request_join_group(GroupKind::Party, 2, 1, Some("hunter2")));

    assert!(system
        .api
        .set_group_privacy(GroupKind::Party, 1, Privacy::FriendsOnly, None));
    assert!(!system.api.request_join_group(GroupKind::Party, 3, 1, None));
    system.app.friends().add_friendship(1, 3);
    assert!(system.api.request_join_group(GroupKind::Party, 3, 1, None));

    assert!(system
        .api
        .set_group_privacy(GroupKind::Party, 1, Privacy::Private, None));
    assert!(!system.api.request_join_group(GroupKind::Party, 4, 1, None));
    // Any member may invite, and an invite bypasses privacy
    assert!(system.api.invite_to_group(GroupKind::Party, 2, 4));
    assert!(system.api.request_join_group(GroupKind::Party, 4, 1, None));

    // Only the leader may change settings or kick
    assert!(!system
        .api
        .set_group_privacy(GroupKind::Party, 2, Privacy::Public, None));
    assert!(!system.api.kick_from_group(GroupKind::Party, 2, 3));
    assert!(system.api.kick_from_group(GroupKind::Party, 1, 3));
    assert_eq!(system.members(GroupKind::Party, 1), vec![1, 2, 4]);
    assert!(system.api.get_group(GroupKind::Party, 3).is_none());

    assert!(!system.api.leave_group(GroupKind::Party, 99));
    assert!(!system.api.leave_group(GroupKind::Party, 3));
}

#[tokio::test]
async fn test_disconnect_clears_queue_and_party() {
    let system = TestSystem::new();
    system.party(1, &[2]);
    assert!(system.api.enqueue_for_match(1, 4).await);

    assert!(system.api.disconnect(1).await);
    assert_eq!(system.api.queued_size(1).await, None);
    assert!(system.api.get_group(GroupKind::Party, 1).is_none());
    assert!(system.api.get_group(GroupKind::Party, 2).is_none());
    assert!(system.squad_store.stored_participants().is_empty());

    assert!(!system.api.disconnect(1).await);
}

#[tokio::test]
async fn test_leader_leaving_drops_queued_party_at_next_drain() {
    let system = TestSystem::new();
    system.party(1, &[]);
    system.party(3, &[]);
    assert!(system.api.enqueue_for_match(1, 2).await);

    assert!(system.api.leave_group(GroupKind::Party, 1));
    assert!(system.api.enqueue_for_match(3, 2).await);

    assert!(system.publisher.get_published_events().is_empty());
    assert_eq!(system.api.queued_size(1).await, None);
    assert_eq!(system.api.queued_size(3).await, Some(QueueSize::Duo));
}

#[tokio::test]
async fn test_cooldown_defers_drain_until_next_trigger() {
    let system = TestSystem::with_cooldown(Duration::from_millis(50));
    system.party(1, &[]);
    system.party(2, &[]);

    assert!(system.api.enqueue_for_match(1, 2).await);
    assert!(system.api.enqueue_for_match(2, 2).await);
    assert!(system.publisher.get_published_events().is_empty());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let outcome = system.app.queue().trigger_drain(QueueSize::Duo).await;
    assert!(outcome.and_then(|o| o.formed().cloned()).is_some());
    assert_eq!(system.publisher.get_published_events().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_party_joins_keep_membership_exclusive() {
    let system = TestSystem::new();
    for participant in 1..=40 {
        assert!(system.api.connect(participant));
    }

    // Everyone tries to join two different leaders at once
    let requests = (1..=40u64)
        .filter(|participant| participant % 4 != 1)
        .flat_map(|participant| {
            let home = participant - (participant - 1) % 4;
            let away = (home + 4 - 1) % 40 + 1;
            [(participant, home), (participant, away)]
        })
        .map(|(joiner, leader)| {
            let api = system.api.clone();
            tokio::spawn(async move { api.request_join_group(GroupKind::Party, joiner, leader, None) })
        });
    join_all(requests).await;

    let mut seen = HashSet::new();
    let mut leaders = HashSet::new();
    for participant in 1..=40 {
        let party = system
            .api
            .get_group(GroupKind::Party, participant)
            .expect("every participant keeps a party");
        assert!(party.members.contains(&participant));
        assert!(party.members.contains(&party.leader));
        if leaders.insert(party.leader) {
            for member in party.members {
                assert!(seen.insert(member), "{} is in two parties", member);
            }
        }
    }
    assert_eq!(seen.len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueues_form_disjoint_matches() {
    let system = TestSystem::new();
    for participant in 1..=40 {
        system.party(participant, &[]);
    }

    let enqueues = (1..=40u64).map(|participant| {
        let api = system.api.clone();
        tokio::spawn(async move { api.enqueue_for_match(participant, 2).await })
    });
    let results = join_all(enqueues).await;
    assert!(results.into_iter().all(|result| result.unwrap()));

    // Arrivals that met a busy gate are picked up by later drains
    let queue = system.app.queue();
    while let Some(outcome) = queue.trigger_drain(QueueSize::Duo).await {
        if outcome.formed().is_none() {
            break;
        }
    }

    let events = system.publisher.get_published_events();
    assert_eq!(events.len(), 20);
    let mut seen = HashSet::new();
    for formed in &events {
        assert_eq!(formed.members.len(), 2);
        assert!(!formed.under_filled);
        for member in &formed.members {
            assert!(seen.insert(*member), "{} matched twice", member);
        }
    }
    assert_eq!(system.app.stats().await.unwrap().queued_parties, 0);
}
