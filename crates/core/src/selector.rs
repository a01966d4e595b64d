use crate::traits::{Session, SessionHandle};
use tracing::debug;

fn is_playing(session: &dyn SessionHandle) -> bool {
    match session.playback_state() {
        Ok(Some(state)) => state.state.is_playing(),
        Ok(None) => false,
        Err(e) => {
            debug!("Ignoring session {} while selecting: {}", session.package_name(), e);
            false
        }
    }
}

/// Pick the active session: the first playing one in registry order, else the
/// first one, else none.
///
/// Sessions whose state cannot be read count as not playing.
pub fn select_active(sessions: Vec<Session>) -> Option<Session> {
    let index = sessions
        .iter()
        .position(|session| is_playing(session.as_ref()))
        .or_else(|| (!sessions.is_empty()).then_some(0))?;

    let selected = sessions.into_iter().nth(index)?;
    debug!("Selected active session: {}", selected.package_name());
    Some(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaybackState;
    use crate::test_utils::FakeSession;

    fn boxed(sessions: Vec<FakeSession>) -> Vec<Session> {
        sessions.into_iter().map(|s| Box::new(s) as Session).collect()
    }

    #[test]
    fn test_prefers_first_playing_session() {
        let sessions = boxed(vec![
            FakeSession::paused("com.a"),
            FakeSession::playing("com.b"),
            FakeSession::playing("com.c"),
        ]);
        let selected = select_active(sessions).unwrap();
        assert_eq!(selected.package_name(), "com.b");
    }

    #[test]
    fn test_falls_back_to_first_registered() {
        let sessions = boxed(vec![
            FakeSession::paused("com.a"),
            FakeSession::with_state("com.b", PlaybackState::Buffering),
        ]);
        let selected = select_active(sessions).unwrap();
        assert_eq!(selected.package_name(), "com.a");
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        assert!(select_active(Vec::new()).is_none());
    }

    #[test]
    fn test_gone_session_counts_as_not_playing() {
        let gone = FakeSession::playing("com.gone");
        gone.tear_down();
        let sessions = boxed(vec![gone, FakeSession::playing("com.live")]);
        let selected = select_active(sessions).unwrap();
        assert_eq!(selected.package_name(), "com.live");
    }
}
