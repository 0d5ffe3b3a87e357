use std::{
    io::Write,
    process::{Command, Stdio},
};

use anyhow::Context;

use crate::{
    access::{AccessApi, GenerateResponse, LoginResponse, UserData},
    foundation::error::{ReelError, ReelResult},
};

pub const INVALID_CODE: &str = "Invalid Access Code";
pub const CONNECTION_FAILED: &str = "Connection failed";
pub const GENERATE_FAILED: &str = "Failed to generate code";

/// Access-code gate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    code: String,
    error: Option<String>,
    pending: bool,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the input; codes are upper-cased as typed.
    pub fn set_code(&mut self, input: &str) {
        self.code = input.to_uppercase();
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn button_label(&self) -> &'static str {
        if self.pending { "Verifying..." } else { "ENTER" }
    }

    /// Mark the form pending and hand out the code to send, or `None` if a request is already
    /// in flight.
    pub fn begin_submit(&mut self) -> Option<String> {
        if self.pending {
            return None;
        }
        self.pending = true;
        self.error = None;
        Some(self.code.clone())
    }

    /// Settle an in-flight request. Returns the user on success.
    pub fn finish(&mut self, result: ReelResult<LoginResponse>) -> Option<UserData> {
        self.pending = false;
        match result {
            Ok(LoginResponse {
                success: true,
                data: Some(user),
            }) => {
                tracing::info!(user = %user.user_name, "access granted");
                Some(user)
            }
            Ok(_) => {
                tracing::info!("access code refused");
                self.error = Some(INVALID_CODE.to_string());
                None
            }
            Err(err) => {
                tracing::warn!(%err, "login request failed");
                self.error = Some(CONNECTION_FAILED.to_string());
                None
            }
        }
    }

    pub fn submit(&mut self, api: &dyn AccessApi) -> Option<UserData> {
        let code = self.begin_submit()?;
        let result = api.login(&code);
        self.finish(result)
    }
}

/// Invite form fields and the outcome of the last request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InviteDraft {
    pub name: String,
    pub details: String,
    pub generated: Option<String>,
    pub error: Option<String>,
    pub pending: bool,
}

/// Invite-code generator shown to authenticated visitors.
///
/// Collapsed to a single button until opened. Closing clears the minted code and the name; the
/// details field and any error survive a close/open cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InviteGenerator {
    open: bool,
    draft: InviteDraft,
}

impl InviteGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.draft.generated = None;
        self.draft.name.clear();
    }

    pub fn draft(&self) -> &InviteDraft {
        &self.draft
    }

    pub fn set_name(&mut self, name: &str) {
        self.draft.name = name.to_string();
    }

    pub fn set_details(&mut self, details: &str) {
        self.draft.details = details.to_string();
    }

    pub fn generated_code(&self) -> Option<&str> {
        self.draft.generated.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.draft.error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        self.open && !self.draft.pending && !self.draft.name.is_empty()
    }

    pub fn button_label(&self) -> &'static str {
        match (self.open, self.draft.pending) {
            (false, _) => "+ Generate Invite Code",
            (true, true) => "Generating...",
            (true, false) => "Create Access Code",
        }
    }

    /// Mark the form pending, clearing the previous outcome. `false` when submission is
    /// disabled.
    pub fn begin_submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        self.draft.pending = true;
        self.draft.error = None;
        self.draft.generated = None;
        true
    }

    pub fn finish(&mut self, result: ReelResult<GenerateResponse>) {
        self.draft.pending = false;
        match result {
            Ok(GenerateResponse {
                success: true,
                new_code: Some(code),
                ..
            }) => {
                tracing::info!(name = %self.draft.name, "invite code minted");
                self.draft.generated = Some(code);
            }
            Ok(resp) => {
                let msg = resp.error.unwrap_or_else(|| GENERATE_FAILED.to_string());
                tracing::info!(error = %msg, "invite generation refused");
                self.draft.error = Some(msg);
            }
            Err(err) => {
                tracing::warn!(%err, "invite request failed");
                self.draft.error = Some(CONNECTION_FAILED.to_string());
            }
        }
    }

    /// Mint a code for the drafted invitee, authorized by `admin_code`.
    pub fn submit(&mut self, api: &dyn AccessApi, admin_code: &str) {
        if !self.begin_submit() {
            return;
        }
        let result = api.generate(admin_code, &self.draft.name, &self.draft.details);
        self.finish(result);
    }

    /// Put the minted code on `clipboard`, verbatim. `false` when there is nothing to copy.
    pub fn copy_code(&self, clipboard: &mut dyn Clipboard) -> ReelResult<bool> {
        let Some(code) = self.generated_code() else {
            return Ok(false);
        };
        clipboard.set_text(code)?;
        Ok(true)
    }
}

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> ReelResult<()>;
}

/// In-process clipboard.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> ReelResult<()> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// The desktop clipboard, through whichever of `pbcopy`, `wl-copy` or `xclip` is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClipboard;

const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
];

impl SystemClipboard {
    fn pipe_to(program: &str, args: &[&str], text: &str) -> anyhow::Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {program}"))?;
        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("{program} stdin unavailable"))?;
            stdin
                .write_all(text.as_bytes())
                .with_context(|| format!("write to {program}"))?;
        }
        drop(child.stdin.take());
        let status = child.wait().with_context(|| format!("wait for {program}"))?;
        anyhow::ensure!(status.success(), "{program} exited with status {status}");
        Ok(())
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> ReelResult<()> {
        let mut last = None;
        for (program, args) in CLIPBOARD_TOOLS {
            match Self::pipe_to(program, args, text) {
                Ok(()) => return Ok(()),
                Err(err) => last = Some(err),
            }
        }
        let err = last.map(|e| format!("{e:#}")).unwrap_or_default();
        tracing::warn!(%err, "no clipboard tool accepted the text");
        Err(ReelError::access(format!("clipboard unavailable: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Canned answers, recording what was sent.
    #[derive(Default)]
    struct StubApi {
        login: Option<LoginResponse>,
        generate: Option<GenerateResponse>,
        sent: RefCell<Vec<String>>,
    }

    impl AccessApi for StubApi {
        fn login(&self, code: &str) -> ReelResult<LoginResponse> {
            self.sent.borrow_mut().push(code.to_string());
            self.login
                .clone()
                .ok_or_else(|| ReelError::access("unreachable"))
        }

        fn generate(
            &self,
            creator_code: &str,
            new_name: &str,
            _new_details: &str,
        ) -> ReelResult<GenerateResponse> {
            self.sent
                .borrow_mut()
                .push(format!("{creator_code}:{new_name}"));
            self.generate
                .clone()
                .ok_or_else(|| ReelError::access("unreachable"))
        }
    }

    fn user() -> UserData {
        UserData {
            user_name: "Ada".to_string(),
            details: serde_json::Value::Null,
            access_code: "DROAME-ADA".to_string(),
        }
    }

    #[test]
    fn login_uppercases_and_returns_user() {
        let api = StubApi {
            login: Some(LoginResponse {
                success: true,
                data: Some(user()),
            }),
            ..Default::default()
        };
        let mut form = LoginForm::new();
        form.set_code("droame-ada");
        assert_eq!(form.code(), "DROAME-ADA");
        assert_eq!(form.submit(&api), Some(user()));
        assert_eq!(api.sent.borrow().as_slice(), ["DROAME-ADA"]);
        assert!(!form.is_pending());
        assert!(form.error().is_none());
    }

    #[test]
    fn refused_login_shows_invalid_code() {
        let api = StubApi {
            login: Some(LoginResponse::default()),
            ..Default::default()
        };
        let mut form = LoginForm::new();
        form.set_code("nope");
        assert!(form.submit(&api).is_none());
        assert_eq!(form.error(), Some(INVALID_CODE));
        assert!(!form.is_pending());
    }

    #[test]
    fn success_without_user_is_refused() {
        let mut form = LoginForm::new();
        assert!(form.begin_submit().is_some());
        let out = form.finish(Ok(LoginResponse {
            success: true,
            data: None,
        }));
        assert!(out.is_none());
        assert_eq!(form.error(), Some(INVALID_CODE));
    }

    #[test]
    fn transport_failure_shows_connection_failed() {
        let mut form = LoginForm::new();
        assert!(form.submit(&StubApi::default()).is_none());
        assert_eq!(form.error(), Some(CONNECTION_FAILED));
        assert!(!form.is_pending());
    }

    #[test]
    fn pending_login_blocks_resubmit() {
        let mut form = LoginForm::new();
        assert!(form.begin_submit().is_some());
        assert_eq!(form.button_label(), "Verifying...");
        assert!(form.begin_submit().is_none());
        form.finish(Err(ReelError::access("x")));
        assert_eq!(form.button_label(), "ENTER");
    }

    #[test]
    fn invite_requires_open_form_and_name() {
        let mut invites = InviteGenerator::new();
        assert!(!invites.can_submit());
        assert_eq!(invites.button_label(), "+ Generate Invite Code");
        invites.open();
        assert!(!invites.can_submit());
        invites.set_name("Ratan");
        assert!(invites.can_submit());
    }

    #[test]
    fn invite_success_then_copy() {
        let api = StubApi {
            generate: Some(GenerateResponse {
                success: true,
                new_code: Some("DROAME-7Q2X".to_string()),
                error: None,
            }),
            ..Default::default()
        };
        let mut invites = InviteGenerator::new();
        invites.open();
        invites.set_name("Ratan");
        invites.set_details("Met at Tech Summit");
        invites.submit(&api, "DROAME-ADA");
        assert_eq!(api.sent.borrow().as_slice(), ["DROAME-ADA:Ratan"]);
        assert_eq!(invites.generated_code(), Some("DROAME-7Q2X"));

        let mut clip = MemoryClipboard::default();
        assert!(invites.copy_code(&mut clip).unwrap());
        assert_eq!(clip.contents.as_deref(), Some("DROAME-7Q2X"));
    }

    #[test]
    fn invite_failure_messages() {
        let mut invites = InviteGenerator::new();
        invites.open();
        invites.set_name("x");

        assert!(invites.begin_submit());
        invites.finish(Ok(GenerateResponse {
            success: false,
            new_code: None,
            error: Some("Unauthorized".to_string()),
        }));
        assert_eq!(invites.error(), Some("Unauthorized"));

        assert!(invites.begin_submit());
        assert!(invites.error().is_none());
        invites.finish(Ok(GenerateResponse::default()));
        assert_eq!(invites.error(), Some(GENERATE_FAILED));

        assert!(invites.begin_submit());
        invites.finish(Err(ReelError::access("down")));
        assert_eq!(invites.error(), Some(CONNECTION_FAILED));
        assert!(!invites.draft().pending);
    }

    #[test]
    fn closing_clears_code_and_name_only() {
        let mut invites = InviteGenerator::new();
        invites.open();
        invites.set_name("Ratan");
        invites.set_details("notes");
        assert!(invites.begin_submit());
        invites.finish(Ok(GenerateResponse {
            success: true,
            new_code: Some("C".to_string()),
            error: None,
        }));
        invites.close();
        assert!(!invites.is_open());
        assert!(invites.generated_code().is_none());
        assert!(invites.draft().name.is_empty());
        assert_eq!(invites.draft().details, "notes");

        let mut clip = MemoryClipboard::default();
        assert!(!invites.copy_code(&mut clip).unwrap());
        assert!(clip.contents.is_none());
    }
}
