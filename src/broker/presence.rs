use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::session::{Outbound, Session};
use super::topic::{Topic, TopicRouter};

/// Outcome of binding a nickname.
#[derive(Debug)]
pub struct Entered {
    /// Sorted snapshot taken right after the change.
    pub nicknames: Arc<Vec<String>>,
    /// Session that previously held the nickname, already closed.
    pub displaced: Option<Arc<Session>>,
    /// Nickname this session held before re-entering under a new one.
    pub released: Option<String>,
}

/// Nickname to session map.
///
/// Every change is broadcast as a full snapshot on [`Topic::Users`] while the
/// registry lock is held, so subscribers observe snapshots in change order.
/// Lock order is registry then topics.
pub struct PresenceRegistry {
    users: Mutex<HashMap<String, Arc<Session>>>,
    topics: Arc<TopicRouter>,
}

impl PresenceRegistry {
    pub fn new(topics: Arc<TopicRouter>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            topics,
        }
    }

    /// Bind `nickname` to `session`. Last enter wins: a different session
    /// holding the nickname is unbound and closed.
    ///
    /// Returns `None` if `session` was closed before the registry lock was
    /// taken; disconnect runs its removal under the same lock.
    pub fn add_user(&self, nickname: &str, session: &Arc<Session>) -> Option<Entered> {
        let mut users = self.users.lock();
        if !session.is_live() {
            return None;
        }

        let released = session
            .bind(nickname.to_string())
            .filter(|previous| previous != nickname);
        if let Some(ref previous) = released {
            if users
                .get(previous)
                .is_some_and(|holder| Arc::ptr_eq(holder, session))
            {
                users.remove(previous);
            }
        }

        let displaced = users
            .insert(nickname.to_string(), session.clone())
            .filter(|prior| !Arc::ptr_eq(prior, session));
        if let Some(ref prior) = displaced {
            prior.unbind();
            prior.close();
            tracing::info!(
                nickname,
                displaced_session = %prior.session_id,
                session_id = %session.session_id,
                "nickname re-entered, displacing previous session"
            );
        }

        let nicknames = snapshot(&users);
        self.topics
            .publish(Topic::Users, Outbound::Users(nicknames.clone()));

        Some(Entered {
            nicknames,
            displaced,
            released,
        })
    }

    /// Unbind whatever nickname `session` holds.
    ///
    /// Returns the new snapshot if the registry changed. A session whose
    /// nickname was already taken over by another session only loses its
    /// binding; the new holder is left alone.
    pub fn remove_user(&self, session: &Session) -> Option<Arc<Vec<String>>> {
        let mut users = self.users.lock();
        let nickname = session.unbind()?;

        let owns_entry = users
            .get(&nickname)
            .is_some_and(|holder| holder.session_id == session.session_id);
        if !owns_entry {
            return None;
        }
        users.remove(&nickname);

        let nicknames = snapshot(&users);
        self.topics
            .publish(Topic::Users, Outbound::Users(nicknames.clone()));
        Some(nicknames)
    }

    /// Subscribe to the user list and immediately send the current snapshot
    /// to the new subscriber.
    pub fn subscribe_users(&self, session: &Arc<Session>) -> bool {
        let users = self.users.lock();
        let added = self.topics.subscribe(session, Topic::Users);
        if added {
            session.deliver(Outbound::Users(snapshot(&users)));
        }
        added
    }

    pub fn lookup(&self, nickname: &str) -> Option<Arc<Session>> {
        self.users.lock().get(nickname).cloned()
    }

    pub fn nicknames(&self) -> Arc<Vec<String>> {
        snapshot(&self.users.lock())
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }
}

fn snapshot(users: &HashMap<String, Arc<Session>>) -> Arc<Vec<String>> {
    let mut nicknames: Vec<String> = users.keys().cloned().collect();
    nicknames.sort();
    Arc::new(nicknames)
}
