//! Viewer-scoped presence projection.
//!
//! Pure functions only: the projection depends exclusively on the
//! subject's stored state, the viewer identity, and the supplied `now`,
//! so it is testable without mocking global time.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use khidma_entity::presence::PresenceView;
use khidma_entity::user::model::User;
use khidma_entity::user::OnlineStatus;

/// The vague phrase shown when exact recency must be hidden.
pub const LAST_SEEN_RECENTLY: &str = "Last seen recently";

/// Compute what `viewer` is allowed to see of `subject`'s presence.
///
/// Rules, in order:
/// 1. Self-view: always full fidelity.
/// 2. Privacy switch off: masked as offline, vague recency, for everyone else.
/// 3. `dnd`: masked as offline to others (the subject still sees their
///    own true state via rule 1).
/// 4. Otherwise: true status with a human-relative recency rendering.
pub fn project(subject: &User, viewer: Uuid, now: DateTime<Utc>) -> PresenceView {
    if viewer == subject.id {
        return PresenceView {
            user_id: subject.id,
            online_status: subject.online_status,
            last_seen_text: status_text(subject, now),
            last_seen: Some(subject.last_activity),
            show_status: true,
            status_message: subject.custom_status_message.clone(),
        };
    }

    if !subject.presence_visible() || subject.online_status == OnlineStatus::Dnd {
        return PresenceView {
            user_id: subject.id,
            online_status: OnlineStatus::Offline,
            last_seen_text: LAST_SEEN_RECENTLY.to_string(),
            last_seen: None,
            show_status: subject.show_online_status,
            status_message: None,
        };
    }

    PresenceView {
        user_id: subject.id,
        online_status: subject.online_status,
        last_seen_text: status_text(subject, now),
        last_seen: Some(subject.last_activity),
        show_status: true,
        status_message: match subject.online_status {
            OnlineStatus::Away => subject.custom_status_message.clone(),
            _ => None,
        },
    }
}

/// Render the human-readable status line for a visible subject.
fn status_text(subject: &User, now: DateTime<Utc>) -> String {
    match subject.online_status {
        OnlineStatus::Online => "Online".to_string(),
        OnlineStatus::Away => match &subject.custom_status_message {
            Some(msg) if !msg.is_empty() => format!("Away - {msg}"),
            _ => "Away".to_string(),
        },
        OnlineStatus::Dnd => match &subject.custom_status_message {
            Some(msg) if !msg.is_empty() => format!("Do not disturb - {msg}"),
            _ => "Do not disturb".to_string(),
        },
        OnlineStatus::Offline => relative_phrase(subject.last_activity, now),
    }
}

/// Bucket elapsed time since `last_activity` into a recency phrase.
fn relative_phrase(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - last_activity;
    let minutes = elapsed.num_minutes();

    if minutes < 1 {
        "Last seen just now".to_string()
    } else if minutes < 60 {
        format!(
            "Last seen {minutes} minute{} ago",
            if minutes == 1 { "" } else { "s" }
        )
    } else if minutes < 60 * 24 {
        let hours = elapsed.num_hours();
        format!("Last seen {hours} hour{} ago", if hours == 1 { "" } else { "s" })
    } else {
        let days = elapsed.num_days();
        format!("Last seen {days} day{} ago", if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subject(status: OnlineStatus, visible: bool, message: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "fatima".to_string(),
            online_status: status,
            last_activity: now,
            show_online_status: visible,
            custom_status_message: message.map(String::from),
            created_at: now,
        }
    }

    #[test]
    fn self_view_is_full_fidelity() {
        let user = subject(OnlineStatus::Dnd, false, Some("In a meeting"));
        let view = project(&user, user.id, Utc::now());
        assert_eq!(view.online_status, OnlineStatus::Dnd);
        assert_eq!(view.last_seen, Some(user.last_activity));
        assert_eq!(view.status_message.as_deref(), Some("In a meeting"));
        assert!(view.show_status);
    }

    #[test]
    fn hidden_subject_is_masked_for_any_other_viewer() {
        for status in [
            OnlineStatus::Online,
            OnlineStatus::Away,
            OnlineStatus::Dnd,
            OnlineStatus::Offline,
        ] {
            let user = subject(status, false, Some("secret"));
            let view = project(&user, Uuid::new_v4(), Utc::now());
            assert_eq!(view.online_status, OnlineStatus::Offline);
            assert_eq!(view.last_seen_text, LAST_SEEN_RECENTLY);
            assert_eq!(view.last_seen, None);
            assert!(!view.show_status);
            assert_eq!(view.status_message, None);
        }
    }

    #[test]
    fn dnd_appears_offline_to_others() {
        let user = subject(OnlineStatus::Dnd, true, Some("In a meeting"));
        let view = project(&user, Uuid::new_v4(), Utc::now());
        assert_eq!(view.online_status, OnlineStatus::Offline);
        assert_eq!(view.last_seen_text, LAST_SEEN_RECENTLY);
        assert_eq!(view.last_seen, None);
        assert_eq!(view.status_message, None);
    }

    #[test]
    fn away_is_visible_with_message() {
        let user = subject(OnlineStatus::Away, true, Some("Back at 3pm"));
        let view = project(&user, Uuid::new_v4(), Utc::now());
        assert_eq!(view.online_status, OnlineStatus::Away);
        assert_eq!(view.last_seen_text, "Away - Back at 3pm");
        assert_eq!(view.status_message.as_deref(), Some("Back at 3pm"));
    }

    #[test]
    fn away_without_message() {
        let user = subject(OnlineStatus::Away, true, None);
        let view = project(&user, Uuid::new_v4(), Utc::now());
        assert_eq!(view.last_seen_text, "Away");
    }

    #[test]
    fn online_subject_shows_online() {
        let user = subject(OnlineStatus::Online, true, None);
        let view = project(&user, Uuid::new_v4(), Utc::now());
        assert_eq!(view.online_status, OnlineStatus::Online);
        assert_eq!(view.last_seen_text, "Online");
    }

    #[test]
    fn offline_recency_buckets() {
        let now = Utc::now();
        let mut user = subject(OnlineStatus::Offline, true, None);

        user.last_activity = now - Duration::seconds(30);
        assert_eq!(project(&user, Uuid::new_v4(), now).last_seen_text, "Last seen just now");

        user.last_activity = now - Duration::minutes(1);
        assert_eq!(
            project(&user, Uuid::new_v4(), now).last_seen_text,
            "Last seen 1 minute ago"
        );

        user.last_activity = now - Duration::minutes(45);
        assert_eq!(
            project(&user, Uuid::new_v4(), now).last_seen_text,
            "Last seen 45 minutes ago"
        );

        user.last_activity = now - Duration::hours(3);
        assert_eq!(
            project(&user, Uuid::new_v4(), now).last_seen_text,
            "Last seen 3 hours ago"
        );

        user.last_activity = now - Duration::days(2);
        assert_eq!(
            project(&user, Uuid::new_v4(), now).last_seen_text,
            "Last seen 2 days ago"
        );
    }

    #[test]
    fn projection_is_deterministic_in_now() {
        let user = subject(OnlineStatus::Offline, true, None);
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        assert_eq!(project(&user, viewer, now), project(&user, viewer, now));
    }
}
