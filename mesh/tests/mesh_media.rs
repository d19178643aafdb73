//! Integration tests for local media handling
//!
//! Covers:
//! - Voice and screen routing into separate registries
//! - Screen share exclusivity and the external "stop sharing" path
//! - Mute semantics and speaking indicators
//! - Refused capture permissions
//! - Resource release on leave

mod common;

use common::{Fixture, ROOM, settle, wait_until};
use roommesh::{AudioQuality, MediaOptions, SessionError, SessionUpdate, SpeakerKey};
use std::time::Duration;

const SPEAKING_TIMEOUT: Duration = Duration::from_secs(3);

#[test]
fn test_streams_are_routed_by_tag() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut bob = fx.peer();
    let alice_id = alice.join("Alice");
    bob.join("Bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut bob]);

    let alice_mic = alice.media.microphone().unwrap();
    let alice_screen = alice.media.screen().unwrap();

    assert_eq!(bob.session.shared_screens(), vec!["Alice".to_string()]);
    assert!(bob.session.shared_screen("Alice").unwrap().same_as(&alice_screen));
    assert_eq!(bob.session.remote_voices(), vec![(alice_id.clone(), "Alice".to_string())]);
    assert!(bob.session.remote_voice(&alice_id).unwrap().same_as(&alice_mic));

    // The sharer sees its own screen under its own name
    assert_eq!(alice.session.shared_screens(), vec!["Alice".to_string()]);
    assert_eq!(alice.session.outgoing_screen_link_count(), 1);
    assert_eq!(bob.session.screen_link_count(), 1);
    assert_eq!(bob.session.voice_link_count(), 1);
}

#[test]
fn test_late_joiner_receives_existing_share() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    alice.join("Alice");
    settle(&mut [&mut alice]);
    alice.session.start_screen_share().unwrap();

    let mut bob = fx.peer();
    bob.join("Bob");
    settle(&mut [&mut alice, &mut bob]);

    assert_eq!(bob.session.shared_screens(), vec!["Alice".to_string()]);
    assert_eq!(alice.session.outgoing_screen_link_count(), 1);
}

#[test]
fn test_second_share_is_rejected() {
    let fx = Fixture::new();
    let mut alice = fx.peer();

    assert_eq!(
        alice.session.start_screen_share(),
        Err(SessionError::NotJoined)
    );

    alice.join("Alice");
    alice.session.start_screen_share().unwrap();
    let first = alice.media.screen().unwrap();

    assert_eq!(
        alice.session.start_screen_share(),
        Err(SessionError::AlreadySharing)
    );
    assert!(alice.session.is_sharing());
    assert!(first.is_active());
    assert!(alice.media.screen().unwrap().same_as(&first));
}

#[test]
fn test_stop_share_when_not_sharing_is_noop() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    alice.join("Alice");

    assert_eq!(alice.session.stop_screen_share(), Ok(()));
    assert!(!alice.session.is_sharing());
}

#[test]
fn test_external_stop_tears_down_share() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut bob = fx.peer();
    alice.join("Alice");
    bob.join("Bob");
    settle(&mut [&mut alice, &mut bob]);

    let updates = alice.session.subscribe();
    alice.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.session.shared_screens().len(), 1);

    // Platform "stop sharing" control
    alice.media.screen().unwrap().stop();
    settle(&mut [&mut alice, &mut bob]);

    assert!(!alice.session.is_sharing());
    assert_eq!(alice.session.outgoing_screen_link_count(), 0);
    assert!(alice.session.shared_screens().is_empty());
    assert!(bob.session.shared_screens().is_empty());
    assert_eq!(bob.session.voice_link_count(), 1);

    let updates: Vec<SessionUpdate> = updates.try_iter().collect();
    assert!(updates.contains(&SessionUpdate::SharingChanged(false)));
    assert!(!updates
        .iter()
        .any(|u| matches!(u, SessionUpdate::CommandFailed { .. })));

    // Sharing again works after the external stop
    alice.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.session.shared_screens(), vec!["Alice".to_string()]);
}

#[test]
fn test_mute_silences_speaking_without_touching_links() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut bob = fx.peer();
    let alice_id = alice.join("Alice");
    bob.join("Bob");
    settle(&mut [&mut alice, &mut bob]);
    let links_before = (
        alice.session.active_link_count(),
        bob.session.active_link_count(),
        fx.hub.open_link_count(),
    );

    alice.talk();
    let remote = SpeakerKey::Remote(alice_id.clone());
    assert!(wait_until(&mut [&mut alice, &mut bob], SPEAKING_TIMEOUT, |p| {
        p[0].session.is_speaking(&SpeakerKey::Local) && p[1].session.is_speaking(&remote)
    }));

    assert_eq!(alice.session.toggle_mute(), Ok(true));
    assert!(alice.session.is_muted());
    assert!(wait_until(&mut [&mut alice, &mut bob], SPEAKING_TIMEOUT, |p| {
        !p[0].session.is_speaking(&SpeakerKey::Local) && !p[1].session.is_speaking(&remote)
    }));
    assert_eq!(
        (
            alice.session.active_link_count(),
            bob.session.active_link_count(),
            fx.hub.open_link_count(),
        ),
        links_before
    );

    assert_eq!(alice.session.toggle_mute(), Ok(false));
    assert!(wait_until(&mut [&mut alice, &mut bob], SPEAKING_TIMEOUT, |p| {
        p[1].session.is_speaking(&remote)
    }));
}

#[test]
fn test_refused_microphone_aborts_join() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    alice.media.set_microphone_allowed(false);

    let result = alice.session.join("Alice", ROOM, MediaOptions::default());

    assert!(matches!(result, Err(SessionError::MediaAccessDenied(_))));
    assert!(!alice.session.is_joined());
    assert_eq!(fx.hub.endpoint_count(), 0);
    assert!(fx.hub.room_members(ROOM).is_empty());

    // Not retried; a new join after the user allows access works
    alice.media.set_microphone_allowed(true);
    alice.join("Alice");
    assert!(alice.session.is_joined());
}

#[test]
fn test_refused_screen_keeps_session() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    alice.join("Alice");
    alice.media.set_screen_allowed(false);

    assert!(matches!(
        alice.session.start_screen_share(),
        Err(SessionError::MediaAccessDenied(_))
    ));
    assert!(!alice.session.is_sharing());
    assert!(alice.session.is_joined());
}

#[test]
fn test_join_passes_capture_options() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let options = MediaOptions {
        noise_cancellation: false,
        echo_cancellation: true,
        audio_quality: AudioQuality::Low,
    };

    alice.session.join("Alice", ROOM, options).unwrap();

    assert_eq!(alice.media.last_options(), Some(options));
}

#[test]
fn test_join_validates_input() {
    let fx = Fixture::new();
    let mut alice = fx.peer();

    assert!(matches!(
        alice.session.join("  ", ROOM, MediaOptions::default()),
        Err(SessionError::InvalidInput(_))
    ));
    assert!(matches!(
        alice.session.join("Alice", "", MediaOptions::default()),
        Err(SessionError::InvalidInput(_))
    ));
    assert_eq!(alice.media.live_captures(), 0);

    alice.join("Alice");
    assert!(matches!(
        alice.session.join("Alice", ROOM, MediaOptions::default()),
        Err(SessionError::AlreadyJoined)
    ));
}

#[test]
fn test_leave_releases_everything() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut bob = fx.peer();
    alice.join("Alice");
    bob.join("Bob");
    settle(&mut [&mut alice, &mut bob]);
    alice.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut bob]);

    alice.session.leave().unwrap();

    assert_eq!(alice.media.live_captures(), 0);
    assert!(!alice.session.is_joined());
    assert!(alice.session.roster().is_empty());
    assert!(alice.session.speaking().is_empty());
    assert_eq!(alice.session.active_link_count(), 0);
    assert_eq!(fx.hub.open_link_count(), 0);
    assert_eq!(fx.hub.endpoint_count(), 1);
    assert_eq!(fx.hub.room_members(ROOM).len(), 1);

    // Nothing queued before leave reaches the next membership
    assert_eq!(alice.session.process_pending(), 0);
    assert_eq!(alice.session.leave(), Err(SessionError::NotJoined));
}

#[test]
fn test_repeated_join_leave_does_not_leak() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut bob = fx.peer();
    bob.join("Bob");

    for _ in 0..5 {
        alice.join("Alice");
        settle(&mut [&mut alice, &mut bob]);
        assert_eq!(alice.session.voice_link_count(), 1);
        alice.session.leave().unwrap();
        settle(&mut [&mut bob]);
    }

    assert_eq!(bob.session.voice_link_count(), 0);
    assert_eq!(bob.session.roster().len(), 1);
    assert_eq!(fx.hub.endpoint_count(), 1);
    assert_eq!(alice.media.live_captures(), 0);
}

#[test]
fn test_departure_keeps_screen_of_namesake() {
    let fx = Fixture::new();
    let mut alice = fx.peer();
    let mut first_bob = fx.peer();
    let mut second_bob = fx.peer();
    alice.join("Alice");
    first_bob.join("Bob");
    second_bob.join("Bob");
    settle(&mut [&mut alice, &mut first_bob, &mut second_bob]);

    first_bob.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut first_bob, &mut second_bob]);
    second_bob.session.start_screen_share().unwrap();
    settle(&mut [&mut alice, &mut first_bob, &mut second_bob]);

    let second_screen = second_bob.media.screen().unwrap();
    assert_eq!(alice.session.shared_screens(), vec!["Bob".to_string()]);
    assert!(alice.session.shared_screen("Bob").unwrap().same_as(&second_screen));

    first_bob.session.leave().unwrap();
    settle(&mut [&mut alice, &mut second_bob]);

    assert!(second_bob.session.is_sharing());
    assert_eq!(alice.session.shared_screens(), vec!["Bob".to_string()]);
    assert!(alice.session.shared_screen("Bob").unwrap().same_as(&second_screen));
    assert_eq!(alice.session.screen_link_count(), 1);
}

#[test]
fn test_remote_namesake_does_not_replace_local_share() {
    let fx = Fixture::new();
    let mut local = fx.peer();
    let mut namesake = fx.peer();
    local.join("Bob");
    namesake.join("Bob");
    settle(&mut [&mut local, &mut namesake]);

    local.session.start_screen_share().unwrap();
    settle(&mut [&mut local, &mut namesake]);
    namesake.session.start_screen_share().unwrap();
    settle(&mut [&mut local, &mut namesake]);

    let own_screen = local.media.screen().unwrap();
    assert!(local.session.shared_screen("Bob").unwrap().same_as(&own_screen));
    assert!(fx.capture.wait_for("hidden by the local share", Duration::from_secs(1)));

    local.session.stop_screen_share().unwrap();
    settle(&mut [&mut local, &mut namesake]);

    assert!(!local.session.is_sharing());
    assert!(!own_screen.is_active());
    assert!(local
        .session
        .shared_screen("Bob")
        .is_none_or(|screen| !screen.same_as(&own_screen)));
    assert_eq!(local.session.outgoing_screen_link_count(), 0);
}
