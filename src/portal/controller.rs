//! Tokio driver for [`AuthMachine`].
//!
//! One task owns the machine, the current [`Navigation`] and the store
//! subscription. Store calls run as spawned tasks that post their results
//! back into the mailbox, and only while the controller is still alive.
//! Every state change is published as a [`ControllerSnapshot`] over a
//! `watch` channel.

use super::{
    history::{History, site_root},
    liveness::Liveness,
    machine::{AuthMachine, AuthState, Command, Input},
    route::{Navigation, Route, RouteClassifier},
    store::{SessionStore, Subscription},
    view::{View, ViewAction, select_view},
};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, warn};
use url::Url;

#[derive(Clone, Debug)]
pub struct ControllerSnapshot {
    pub state: AuthState,
    pub navigation: Navigation,
    pub view: View,
}

impl ControllerSnapshot {
    /// Whether the session read and any role lookup the current route needs
    /// have finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.view != View::Loading
    }
}

#[derive(Debug)]
enum Message {
    Input(Input),
    Navigate(Url),
    Shutdown,
}

/// Handle to a running controller. Dropping it tears the controller down.
#[derive(Debug)]
pub struct ControllerHandle {
    mailbox: mpsc::UnboundedSender<Message>,
    snapshots: watch::Receiver<ControllerSnapshot>,
    liveness: Liveness,
    task: Option<JoinHandle<()>>,
}

/// Mounts a controller: subscribes to session changes, then starts the
/// initial session read. Must be called from within a tokio runtime.
pub fn spawn(
    store: Arc<dyn SessionStore>,
    history: Arc<dyn History>,
    classifier: RouteClassifier,
) -> ControllerHandle {
    let liveness = Liveness::new();
    let (mailbox, inbox) = mpsc::unbounded_channel();

    let machine = AuthMachine::new();
    let navigation = Navigation::resolve(&classifier, history.location(), false);
    let initial = ControllerSnapshot {
        view: select_view(machine.state(), navigation.route),
        state: machine.state().clone(),
        navigation: navigation.clone(),
    };
    let (publisher, snapshots) = watch::channel(initial);

    // Subscribe before reading so no change between the two is lost.
    let subscription = store.subscribe();

    let actor = Actor {
        machine,
        navigation,
        subscription,
        store,
        history,
        classifier,
        liveness: liveness.clone(),
        feedback: mailbox.clone(),
        publisher,
    };
    actor.fetch_initial_session();

    let task = tokio::spawn(actor.run(inbox));

    ControllerHandle {
        mailbox,
        snapshots,
        liveness,
        task: Some(task),
    }
}

impl ControllerHandle {
    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.snapshots.borrow().view
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.clone()
    }

    /// Shared with work started on behalf of this controller, such as the
    /// recovery exchange.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Waits until a published snapshot satisfies `predicate`. Returns `None`
    /// if the controller stopped first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ControllerSnapshot) -> bool,
    ) -> Option<ControllerSnapshot> {
        let mut snapshots = self.snapshots.clone();
        snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .ok()
            .map(|snapshot| snapshot.clone())
    }

    pub fn navigate(&self, url: Url) {
        self.send(Message::Navigate(url));
    }

    pub fn sign_out(&self) {
        self.send(Message::Input(Input::SignOutRequested));
    }

    pub fn go_home(&self) {
        let home = site_root(&self.snapshots.borrow().navigation.url);
        self.navigate(home);
    }

    /// Runs a control offered by the current view. Signing out also leaves
    /// for the site root.
    pub fn perform(&self, action: ViewAction) {
        match action {
            ViewAction::GoHome => self.go_home(),
            ViewAction::SignOut => {
                self.sign_out();
                self.go_home();
            }
        }
    }

    /// Tears the controller down and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.liveness.kill();
        self.send(Message::Shutdown);
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            error!("Controller task failed: {err}");
        }
    }

    fn send(&self, message: Message) {
        if self.mailbox.send(message).is_err() {
            debug!("Controller already stopped");
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.liveness.kill();
            let _ = self.mailbox.send(Message::Shutdown);
        }
    }
}

struct Actor {
    machine: AuthMachine,
    navigation: Navigation,
    subscription: Subscription,
    store: Arc<dyn SessionStore>,
    history: Arc<dyn History>,
    classifier: RouteClassifier,
    liveness: Liveness,
    feedback: mpsc::UnboundedSender<Message>,
    publisher: watch::Sender<ControllerSnapshot>,
}

impl Actor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        let mut notifications_open = true;

        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(Message::Input(input)) => self.apply(input),
                    Some(Message::Navigate(url)) => self.navigate(url),
                    Some(Message::Shutdown) | None => break,
                },
                change = self.subscription.recv(), if notifications_open => match change {
                    Some(change) => self.apply(Input::SessionChanged(change)),
                    None => {
                        warn!("Session change notifications closed");
                        notifications_open = false;
                    }
                },
            }
        }

        self.liveness.kill();
        self.apply(Input::TornDown);
        debug!("Controller stopped");
    }

    fn apply(&mut self, input: Input) {
        let signaled_before = self.machine.recovery_signaled();
        let commands = self.machine.handle(input);

        if !signaled_before && self.machine.recovery_signaled() {
            self.navigation = Navigation::resolve(&self.classifier, self.history.location(), true);
        }

        for command in commands {
            self.execute(command);
        }
        self.publish();
    }

    fn navigate(&mut self, url: Url) {
        self.machine.clear_recovery_signal();
        self.history.push(url.clone());
        self.navigation = Navigation::resolve(&self.classifier, url, false);
        debug!("Navigated to {} route", self.navigation.route);
        self.publish();
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::ResolveRole { epoch, user_id } => {
                let store = Arc::clone(&self.store);
                let liveness = self.liveness.clone();
                let feedback = self.feedback.clone();
                tokio::spawn(async move {
                    let result = store.is_user_authorized_admin(&user_id).await;
                    if liveness.is_alive() {
                        let resolved = Input::RoleResolved { epoch, result };
                        let _ = feedback.send(Message::Input(resolved));
                    }
                });
            }
            Command::SignOut => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    if let Err(err) = store.sign_out().await {
                        warn!("Sign-out request failed: {err}");
                    }
                });
            }
            Command::Unsubscribe => {
                self.subscription.unsubscribe();
            }
        }
    }

    fn fetch_initial_session(&self) {
        let store = Arc::clone(&self.store);
        let liveness = self.liveness.clone();
        let feedback = self.feedback.clone();
        tokio::spawn(async move {
            let result = store.current_session().await;
            if liveness.is_alive() {
                let _ = feedback.send(Message::Input(Input::SessionFetched(result)));
            }
        });
    }

    fn publish(&self) {
        let snapshot = ControllerSnapshot {
            state: self.machine.state().clone(),
            navigation: self.navigation.clone(),
            view: select_view(self.machine.state(), self.navigation.route),
        };
        if snapshot.navigation.route == Route::Recovery || snapshot.view != View::Loading {
            debug!(
                "View {} for {} on {} route",
                snapshot.view,
                snapshot.state.name(),
                snapshot.navigation.route
            );
        }
        self.publisher.send_replace(snapshot);
    }
}
