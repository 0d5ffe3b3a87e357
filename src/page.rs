use std::time::{Duration, Instant};

use crate::access::{
    AccessApi, UserData,
    forms::{InviteGenerator, LoginForm},
};

pub const WELCOME_TAGLINE: &str = "To the world of drones";
pub const PERSISTENT_LABEL: &str = "Authorized Access";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Onboarding {
    /// Welcome screen is up until the deadline.
    Welcoming { until: Instant },
    Done,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Admission {
    pub user: UserData,
    pub onboarding: Onboarding,
    pub invites: InviteGenerator,
}

/// Who is looking at the page. A welcome without a user cannot be expressed.
#[derive(Clone, Debug, PartialEq)]
pub enum Session {
    Gated(LoginForm),
    Admitted(Admission),
}

/// What the page shows right now.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PageView {
    Gate {
        code: String,
        button: String,
        error: Option<String>,
    },
    Welcome {
        headline: String,
        tagline: String,
    },
    Persistent {
        label: String,
        user_name: String,
        invite_button: String,
    },
}

/// Top-level page flow: access gate, then a timed welcome, then the persistent UI.
///
/// The media stage is meant to be mounted as soon as the session is admitted, so it preloads
/// behind the welcome screen.
#[derive(Clone, Debug, PartialEq)]
pub struct LandingPage {
    session: Session,
    welcome: Duration,
}

impl LandingPage {
    pub fn new(welcome: Duration) -> Self {
        Self {
            session: Session::Gated(LoginForm::new()),
            welcome,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self.session, Session::Admitted(_))
    }

    pub fn user(&self) -> Option<&UserData> {
        match &self.session {
            Session::Admitted(a) => Some(&a.user),
            Session::Gated(_) => None,
        }
    }

    pub fn login_form_mut(&mut self) -> Option<&mut LoginForm> {
        match &mut self.session {
            Session::Gated(form) => Some(form),
            Session::Admitted(_) => None,
        }
    }

    /// The invite generator; only reachable once the welcome has finished.
    pub fn invites_mut(&mut self) -> Option<&mut InviteGenerator> {
        match &mut self.session {
            Session::Admitted(Admission {
                onboarding: Onboarding::Done,
                invites,
                ..
            }) => Some(invites),
            _ => None,
        }
    }

    /// Submit the gate's current code. Returns whether the page was admitted.
    pub fn submit_login(&mut self, api: &dyn AccessApi, now: Instant) -> bool {
        let Session::Gated(form) = &mut self.session else {
            return false;
        };
        match form.submit(api) {
            Some(user) => {
                self.admit(user, now);
                true
            }
            None => false,
        }
    }

    pub fn admit(&mut self, user: UserData, now: Instant) {
        tracing::info!(user = %user.user_name, welcome_ms = self.welcome.as_millis() as u64, "welcome started");
        self.session = Session::Admitted(Admission {
            user,
            onboarding: Onboarding::Welcoming {
                until: now + self.welcome,
            },
            invites: InviteGenerator::new(),
        });
    }

    /// Advance timers. Returns `true` on the tick that finished the welcome.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Session::Admitted(admission) = &mut self.session else {
            return false;
        };
        match admission.onboarding {
            Onboarding::Welcoming { until } if now >= until => {
                admission.onboarding = Onboarding::Done;
                tracing::info!("welcome finished");
                true
            }
            _ => false,
        }
    }

    /// Time left on the welcome screen, if it is showing.
    pub fn welcome_remaining(&self, now: Instant) -> Option<Duration> {
        match &self.session {
            Session::Admitted(Admission {
                onboarding: Onboarding::Welcoming { until },
                ..
            }) => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }

    pub fn view(&self) -> PageView {
        match &self.session {
            Session::Gated(form) => PageView::Gate {
                code: form.code().to_string(),
                button: form.button_label().to_string(),
                error: form.error().map(str::to_string),
            },
            Session::Admitted(a) => match a.onboarding {
                Onboarding::Welcoming { .. } => PageView::Welcome {
                    headline: format!("Welcome, {}", a.user.user_name),
                    tagline: WELCOME_TAGLINE.to_string(),
                },
                Onboarding::Done => PageView::Persistent {
                    label: PERSISTENT_LABEL.to_string(),
                    user_name: a.user.user_name.clone(),
                    invite_button: a.invites.button_label().to_string(),
                },
            },
        }
    }
}
