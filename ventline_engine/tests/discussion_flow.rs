use std::sync::Arc;
use std::time::Duration;

use ventline_engine::config::{CommunityConfig, LimitsConfig, VentlineConfig, VentlinePaths};
use ventline_engine::database::models::ReactionKind;
use ventline_engine::database::Database;
use ventline_engine::error::EngineError;
use ventline_engine::messenger::{RecordingMessenger, Target};
use ventline_engine::mirror::MirrorOutcome;
use ventline_engine::service::{
    DiscussionService, IncomingMessage, OutcomeEvent, UserAction, UserInput,
};

fn test_config(draft_ttl: Duration) -> VentlineConfig {
    VentlineConfig {
        paths: VentlinePaths::default(),
        community: CommunityConfig {
            admin_user_id: Some("admin".into()),
        },
        limits: LimitsConfig {
            draft_ttl,
            page_size: 5,
        },
    }
}

fn setup(draft_ttl: Duration) -> (Arc<RecordingMessenger>, DiscussionService) {
    let database = Database::open_in_memory().expect("in-memory db");
    let messenger = Arc::new(RecordingMessenger::new());
    let service = DiscussionService::new(database, messenger.clone(), &test_config(draft_ttl));
    (messenger, service)
}

async fn act(service: &DiscussionService, user: &str, action: UserAction) -> OutcomeEvent {
    service
        .handle_user_input(user, UserInput::Action(action))
        .await
        .expect("action handled")
}

async fn say(service: &DiscussionService, user: &str, text: &str) -> OutcomeEvent {
    service
        .handle_user_input(user, UserInput::Message(IncomingMessage::text(text)))
        .await
        .expect("message handled")
}

/// Drives the full submission pipeline: category choice, draft, confirm,
/// admin approval, publication to the channel.
async fn publish(service: &DiscussionService, author: &str, text: &str) -> String {
    act(
        service,
        author,
        UserAction::StartPost {
            category: "WorkLife".into(),
        },
    )
    .await;
    let drafted = say(service, author, text).await;
    assert!(matches!(drafted, OutcomeEvent::DraftReady { .. }));

    let submitted = act(service, author, UserAction::ConfirmPost).await;
    let OutcomeEvent::PostSubmitted { post_id } = submitted else {
        panic!("expected PostSubmitted, got {submitted:?}");
    };

    // Bootstrap the admin (the configured id receives the admin flag) and
    // publish.
    service.profiles().ensure_user("admin").expect("admin bootstrap");
    let approved = service
        .moderation()
        .approve("admin", &post_id)
        .await
        .expect("approval");
    assert!(approved.approved);
    assert!(approved.mirror_handle.is_some());
    post_id
}

#[tokio::test]
async fn full_thread_scenario_matches_expected_counts() {
    let (messenger, service) = setup(Duration::from_secs(300));
    let post_id = publish(&service, "u1", "anonymous thought").await;

    // U2 adds the top-level comment C1.
    act(
        &service,
        "u2",
        UserAction::WriteComment {
            post_id: post_id.clone(),
        },
    )
    .await;
    let OutcomeEvent::CommentAdded {
        comment_id: c1,
        mirror,
        ..
    } = say(&service, "u2", "hello").await
    else {
        panic!("expected CommentAdded");
    };
    assert_eq!(mirror, MirrorOutcome::Updated(1));

    // U3 replies to C1 with R1.
    act(
        &service,
        "u3",
        UserAction::ReplyToComment {
            post_id: post_id.clone(),
            parent_comment_id: c1.clone(),
        },
    )
    .await;
    let OutcomeEvent::CommentAdded { comment_id: r1, .. } = say(&service, "u3", "hi back").await
    else {
        panic!("expected CommentAdded");
    };

    // U2 likes R1.
    let OutcomeEvent::ReactionToggled { tally, .. } = act(
        &service,
        "u2",
        UserAction::ToggleReaction {
            comment_id: r1.clone(),
            kind: ReactionKind::Like,
        },
    )
    .await
    else {
        panic!("expected ReactionToggled");
    };
    assert_eq!((tally.likes, tally.dislikes), (1, 0));

    assert_eq!(
        service.comment_tree().count_descendants(&post_id).unwrap(),
        2
    );
    let children = service
        .comment_tree()
        .list_page(&post_id, Some(&c1), 1, 10)
        .unwrap();
    let child_ids: Vec<_> = children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(child_ids, [r1.as_str()]);

    // The channel message's control mirrors the live count.
    let channel = messenger
        .sent()
        .into_iter()
        .find(|m| m.target == Target::Channel)
        .expect("channel publication");
    let controls = messenger.controls_for(&channel.handle).unwrap();
    assert!(controls[0].label.contains("(2)"));
}

#[tokio::test]
async fn second_message_after_a_consumed_slot_is_ordinary() {
    let (_messenger, service) = setup(Duration::from_secs(300));
    let post_id = publish(&service, "u1", "post under discussion").await;

    act(
        &service,
        "u1",
        UserAction::WriteComment {
            post_id: post_id.clone(),
        },
    )
    .await;

    let first = say(&service, "u1", "attached as a comment").await;
    assert!(matches!(first, OutcomeEvent::CommentAdded { .. }));

    let second = say(&service, "u1", "just chatting").await;
    assert_eq!(second, OutcomeEvent::Unhandled);

    assert_eq!(
        service.comment_tree().count_descendants(&post_id).unwrap(),
        1
    );
}

#[tokio::test]
async fn mirror_refresh_is_idempotent_between_mutations() {
    let (_messenger, service) = setup(Duration::from_secs(300));
    let post_id = publish(&service, "u1", "counter check").await;

    act(
        &service,
        "u2",
        UserAction::WriteComment {
            post_id: post_id.clone(),
        },
    )
    .await;
    say(&service, "u2", "one comment").await;

    // No mutation in between: the second refresh is a no-op success.
    let first = service.mirror().refresh(&post_id).await.unwrap();
    assert_eq!(first, MirrorOutcome::Unchanged(1));
    let second = service.mirror().refresh(&post_id).await.unwrap();
    assert_eq!(second, MirrorOutcome::Unchanged(1));
}

#[tokio::test]
async fn mirror_failure_never_rolls_back_the_comment() {
    let (messenger, service) = setup(Duration::from_secs(300));
    let post_id = publish(&service, "u1", "resilient thread").await;

    messenger.set_fail_updates(true);
    act(
        &service,
        "u2",
        UserAction::WriteComment {
            post_id: post_id.clone(),
        },
    )
    .await;
    let OutcomeEvent::CommentAdded { mirror, .. } = say(&service, "u2", "still written").await
    else {
        panic!("expected CommentAdded");
    };
    assert_eq!(mirror, MirrorOutcome::Failed);

    // The comment is durably committed despite the mirror failure.
    assert_eq!(
        service.comment_tree().count_descendants(&post_id).unwrap(),
        1
    );
}

#[tokio::test]
async fn expired_draft_cannot_be_confirmed() {
    let (_messenger, service) = setup(Duration::ZERO);

    act(
        &service,
        "u1",
        UserAction::StartPost {
            category: "Other".into(),
        },
    )
    .await;
    say(&service, "u1", "too slow").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = service
        .handle_user_input("u1", UserInput::Action(UserAction::ConfirmPost))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DraftExpired));
}

#[tokio::test]
async fn pending_actions_survive_a_restart() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = VentlineConfig {
        paths: VentlinePaths::from_base_dir(temp.path()).expect("paths"),
        community: CommunityConfig {
            admin_user_id: Some("admin".into()),
        },
        limits: LimitsConfig {
            draft_ttl: Duration::from_secs(300),
            page_size: 5,
        },
    };
    std::fs::create_dir_all(&config.paths.data_dir).expect("data dir");

    let post_id = {
        let database = Database::connect(&config.paths).expect("connect");
        database.ensure_migrations().expect("migrations");
        let service =
            DiscussionService::new(database, Arc::new(RecordingMessenger::new()), &config);
        let post_id = publish(&service, "u1", "durable post").await;
        act(
            &service,
            "u1",
            UserAction::WriteComment {
                post_id: post_id.clone(),
            },
        )
        .await;
        post_id
    };

    // A new process: fresh messenger, same database file. The armed slot is
    // still there, so the next message attaches as the comment. The old
    // mirror handle is unknown to the new transport, which degrades the
    // refresh to a warning without touching the comment write.
    let database = Database::connect(&config.paths).expect("reconnect");
    database.ensure_migrations().expect("migrations");
    let service = DiscussionService::new(database, Arc::new(RecordingMessenger::new()), &config);

    let outcome = say(&service, "u1", "after restart").await;
    let OutcomeEvent::CommentAdded { mirror, .. } = outcome else {
        panic!("expected CommentAdded, got {outcome:?}");
    };
    assert_eq!(mirror, MirrorOutcome::Failed);
    assert_eq!(
        service.comment_tree().count_descendants(&post_id).unwrap(),
        1
    );
}

#[tokio::test]
async fn deep_nesting_keeps_counts_and_state_consistent() {
    let (_messenger, service) = setup(Duration::from_secs(300));
    let post_id = publish(&service, "u1", "deep thread").await;

    // Build a five-level chain, each reply armed from the previous one.
    let mut parent: Option<String> = None;
    for depth in 0..5 {
        let action = match &parent {
            None => UserAction::WriteComment {
                post_id: post_id.clone(),
            },
            Some(parent_id) => UserAction::ReplyToComment {
                post_id: post_id.clone(),
                parent_comment_id: parent_id.clone(),
            },
        };
        act(&service, "u2", action).await;
        let OutcomeEvent::CommentAdded { comment_id, .. } =
            say(&service, "u2", &format!("depth {depth}")).await
        else {
            panic!("expected CommentAdded");
        };
        // The slot resets after every message.
        assert_eq!(say(&service, "u2", "noise").await, OutcomeEvent::Unhandled);
        parent = Some(comment_id);
    }

    assert_eq!(
        service.comment_tree().count_descendants(&post_id).unwrap(),
        5
    );
}
