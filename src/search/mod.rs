use std::sync::Mutex;

use tracing::debug;

use crate::github::{ApiError, GitHubApi, Repository, SearchRepositories, Transport};

/// Accumulated pagination state for one query.
///
/// One session per query string; a new query means a new session. All four
/// fields live behind the session's mutex so every mutation goes through a
/// single lock, and `in_flight` guarantees at most one request is
/// outstanding at a time.
#[derive(Debug)]
struct SessionState {
    results: Vec<Repository>,
    page: u32,
    in_flight: bool,
    completed: bool,
}

/// Drives a repository search one page at a time.
///
/// `search` is the only mutating operation. It rejects re-entry while a
/// request is outstanding, appends (or, on reload, replaces) results on
/// success, and leaves all accumulated state untouched on failure.
pub struct SearchSession<T: Transport> {
    api: GitHubApi<T>,
    query: String,
    state: Mutex<SessionState>,
}

impl<T: Transport> SearchSession<T> {
    /// Returns `None` for an empty or whitespace-only query; a blank query
    /// is a construction error, not a runtime search error.
    pub fn new(api: GitHubApi<T>, query: &str) -> Option<Self> {
        if query.trim().is_empty() {
            return None;
        }
        Some(SearchSession {
            api,
            query: query.to_string(),
            state: Mutex::new(SessionState {
                results: Vec::new(),
                page: 1,
                in_flight: false,
                completed: false,
            }),
        })
    }

    /// Fetch the next page (or page 1 again when `reload` is true).
    ///
    /// Returns `Ok(false)` without side effects when the session is already
    /// complete or a request is in flight. Otherwise issues the request and
    /// returns `Ok(true)` once the response has been folded into the
    /// session, or the error with the session left as it was.
    ///
    /// A reload only discards the previously accumulated results after its
    /// request succeeds; a failed reload loses nothing.
    pub async fn search(&self, reload: bool) -> Result<bool, ApiError> {
        let page = {
            let mut state = self.state.lock().unwrap();
            if state.completed || state.in_flight {
                return Ok(false);
            }
            state.in_flight = true;
            if reload {
                1
            } else {
                state.page
            }
        };

        let endpoint = SearchRepositories {
            query: self.query.clone(),
            page,
        };
        let response = self.api.request(&endpoint).await;

        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        let result = response?;

        if reload {
            state.results.clear();
            state.page = 1;
        }
        state.results.extend(result.items);
        state.completed = result.total_count <= state.results.len() as u64;
        state.page += 1;
        debug!(
            query = %self.query,
            page = state.page,
            results = state.results.len(),
            total = result.total_count,
            completed = state.completed,
            "merged search page"
        );
        Ok(true)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Snapshot of the accumulated results, in fetch order.
    pub fn results(&self) -> Vec<Repository> {
        self.state.lock().unwrap().results.clone()
    }

    pub fn result_count(&self) -> usize {
        self.state.lock().unwrap().results.len()
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().unwrap().page
    }

    pub fn completed(&self) -> bool {
        self.state.lock().unwrap().completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::TransportError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Minimal but fully decodable repository body.
    fn repo_json(id: u64, full_name: &str) -> Value {
        let (login, name) = full_name.split_once('/').unwrap();
        json!({
            "id": id,
            "name": name,
            "full_name": full_name,
            "private": false,
            "html_url": format!("https://github.com/{full_name}"),
            "description": null,
            "fork": false,
            "url": format!("https://api.github.com/repos/{full_name}"),
            "created_at": "2015-10-23T21:15:07Z",
            "updated_at": "2016-02-14T08:12:33Z",
            "pushed_at": null,
            "homepage": null,
            "size": 10,
            "stargazers_count": id,
            "watchers_count": id,
            "language": null,
            "forks_count": 0,
            "open_issues_count": 0,
            "default_branch": "master",
            "score": 1.0,
            "owner": {
                "login": login,
                "id": id + 1000,
                "avatar_url": format!("https://avatars.githubusercontent.com/u/{id}"),
                "gravatar_id": "",
                "url": format!("https://api.github.com/users/{login}"),
                "received_events_url": format!("https://api.github.com/users/{login}/received_events"),
                "type": "User"
            }
        })
    }

    fn page_body(total_count: u64, repos: &[(u64, &str)]) -> String {
        let items: Vec<Value> = repos.iter().map(|(id, name)| repo_json(*id, name)).collect();
        json!({
            "total_count": total_count,
            "incomplete_results": false,
            "items": items,
        })
        .to_string()
    }

    fn status_error(status: u16) -> TransportError {
        TransportError::Status {
            status,
            message: None,
        }
    }

    /// Replays queued responses in order; panics if called once the queue
    /// is drained.
    struct QueueTransport {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
    }

    impl QueueTransport {
        fn new(responses: Vec<Result<String, TransportError>>) -> Self {
            QueueTransport {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl Transport for QueueTransport {
        async fn get(
            &self,
            _path: &str,
            _parameters: &[(&'static str, String)],
        ) -> Result<String, TransportError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }
    }

    /// Holds every request until `release` is notified, to keep a request
    /// observably in flight.
    struct GatedTransport {
        release: Arc<Notify>,
        body: String,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn get(
            &self,
            _path: &str,
            _parameters: &[(&'static str, String)],
        ) -> Result<String, TransportError> {
            self.release.notified().await;
            Ok(self.body.clone())
        }
    }

    fn session_with(
        responses: Vec<Result<String, TransportError>>,
        query: &str,
    ) -> SearchSession<QueueTransport> {
        SearchSession::new(GitHubApi::new(QueueTransport::new(responses)), query).unwrap()
    }

    #[test]
    fn blank_query_is_rejected_at_construction() {
        let api = GitHubApi::new(QueueTransport::new(vec![]));
        assert!(SearchSession::new(api, "").is_none());
        let api = GitHubApi::new(QueueTransport::new(vec![]));
        assert!(SearchSession::new(api, "   ").is_none());
    }

    #[tokio::test]
    async fn first_page_accumulates_and_completes() {
        let body = page_body(2, &[(1, "apple/swift"), (2, "openstack/swift")]);
        let session = session_with(vec![Ok(body)], "Swift");

        assert!(session.search(false).await.unwrap());

        let results = session.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].full_name, "apple/swift");
        assert_eq!(results[1].full_name, "openstack/swift");
        assert!(session.completed());
        assert_eq!(session.current_page(), 2);
    }

    #[tokio::test]
    async fn pages_append_in_order_until_total_reached() {
        let session = session_with(
            vec![
                Ok(page_body(3, &[(1, "a/one"), (2, "a/two")])),
                Ok(page_body(3, &[(3, "a/three")])),
            ],
            "a",
        );

        assert!(session.search(false).await.unwrap());
        assert!(!session.completed());
        assert_eq!(session.current_page(), 2);

        assert!(session.search(false).await.unwrap());
        assert!(session.completed());
        assert_eq!(session.current_page(), 3);

        let names: Vec<String> = session.results().into_iter().map(|r| r.full_name).collect();
        assert_eq!(names, ["a/one", "a/two", "a/three"]);
    }

    #[tokio::test]
    async fn completed_session_rejects_further_searches() {
        let session = session_with(vec![Ok(page_body(1, &[(1, "a/one")]))], "a");
        assert!(session.search(false).await.unwrap());
        assert!(session.completed());

        // Queue is empty; an accepted search would panic the transport.
        assert!(!session.search(false).await.unwrap());
    }

    #[tokio::test]
    async fn second_search_while_in_flight_is_rejected_without_side_effects() {
        let release = Arc::new(Notify::new());
        let transport = GatedTransport {
            release: Arc::clone(&release),
            body: page_body(1, &[(1, "a/one")]),
        };
        let session = Arc::new(SearchSession::new(GitHubApi::new(transport), "a").unwrap());

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.search(false).await })
        };
        // Let the first search reach the transport and park there.
        tokio::task::yield_now().await;

        assert!(!session.search(false).await.unwrap());
        assert_eq!(session.result_count(), 0);
        assert_eq!(session.current_page(), 1);

        release.notify_one();
        assert!(first.await.unwrap().unwrap());
        assert_eq!(session.result_count(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched_and_clears_in_flight() {
        let session = session_with(
            vec![
                Ok(page_body(3, &[(1, "a/one")])),
                Err(status_error(403)),
                Ok(page_body(3, &[(2, "a/two"), (3, "a/three")])),
            ],
            "a",
        );

        assert!(session.search(false).await.unwrap());
        let err = session.search(false).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport(TransportError::Status { status: 403, .. })
        ));
        assert_eq!(session.result_count(), 1);
        assert_eq!(session.current_page(), 2);
        assert!(!session.completed());

        // in_flight was cleared, so the retry from the caller is accepted.
        assert!(session.search(false).await.unwrap());
        assert_eq!(session.result_count(), 3);
        assert!(session.completed());
    }

    #[tokio::test]
    async fn reload_replaces_results_and_resets_page() {
        let session = session_with(
            vec![
                Ok(page_body(100, &[(1, "a/one"), (2, "a/two")])),
                Ok(page_body(100, &[(3, "a/three"), (4, "a/four")])),
                Ok(page_body(100, &[(10, "b/fresh")])),
            ],
            "a",
        );

        assert!(session.search(false).await.unwrap());
        assert!(session.search(false).await.unwrap());
        assert_eq!(session.result_count(), 4);
        assert_eq!(session.current_page(), 3);

        assert!(session.search(true).await.unwrap());
        let names: Vec<String> = session.results().into_iter().map(|r| r.full_name).collect();
        assert_eq!(names, ["b/fresh"]);
        assert_eq!(session.current_page(), 2);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_results() {
        let session = session_with(
            vec![
                Ok(page_body(100, &[(1, "a/one"), (2, "a/two")])),
                Err(status_error(500)),
            ],
            "a",
        );

        assert!(session.search(false).await.unwrap());
        assert!(session.search(true).await.is_err());

        // Discard-on-success-only: the old results survive the failed reload.
        assert_eq!(session.result_count(), 2);
        assert_eq!(session.current_page(), 2);
        assert!(!session.completed());
    }

    #[tokio::test]
    async fn decode_error_surfaces_and_state_is_unchanged() {
        let session = session_with(
            vec![Ok(r#"{"total_count": "many"}"#.to_string())],
            "a",
        );

        let err = session.search(false).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert_eq!(session.result_count(), 0);
        assert_eq!(session.current_page(), 1);
    }
}
