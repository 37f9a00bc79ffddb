//! The client side of one SMTP conversation as a closed set of states.
//!
//! Every state waits for exactly one reply code. A matching terminal reply
//! moves the session strictly forward and names the command to write next;
//! anything else ends the session.

/// What the client is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitGreeting,
    AwaitEhloAck,
    AwaitAuthPrompt,
    AwaitUsernamePrompt,
    AwaitPasswordAck,
    AwaitMailFromAck,
    AwaitRcptToAck,
    AwaitDataPrompt,
    AwaitMessageAck,
}

/// Lines the client writes, in the order it writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ehlo,
    AuthLogin,
    /// base64 encoded account name
    Username,
    /// base64 encoded secret
    Password,
    MailFrom,
    RcptTo,
    Data,
    /// headers, dot-stuffed body and the terminating `.` line
    Message,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// write `command`, then wait in `next`
    Advance { command: Command, next: SessionState },
    /// write `command` and end the session successfully without waiting
    /// for a reply
    Finish(Command),
    /// the server refused the credentials
    RejectCredentials,
    /// any other unexpected reply
    Reject,
}

impl SessionState {
    /// The only code accepted in this state.
    pub const fn expected_code(self) -> u16 {
        match self {
            SessionState::AwaitGreeting => 220,
            SessionState::AwaitEhloAck => 250,
            SessionState::AwaitAuthPrompt => 334,
            SessionState::AwaitUsernamePrompt => 334,
            SessionState::AwaitPasswordAck => 235,
            SessionState::AwaitMailFromAck => 250,
            SessionState::AwaitRcptToAck => 250,
            SessionState::AwaitDataPrompt => 354,
            SessionState::AwaitMessageAck => 250,
        }
    }

    /// Transition for a terminal reply line carrying `code`.
    ///
    /// Codes are matched exactly; a different code of the same class is
    /// still a rejection.
    pub fn on_reply(self, code: u16) -> Transition {
        use Command::*;
        use SessionState::*;

        if code != self.expected_code() {
            // the password step is singled out so callers know to rotate the credential
            return match self {
                AwaitPasswordAck => Transition::RejectCredentials,
                _ => Transition::Reject,
            };
        }
        let (command, next) = match self {
            AwaitGreeting => (Ehlo, AwaitEhloAck),
            AwaitEhloAck => (AuthLogin, AwaitAuthPrompt),
            AwaitAuthPrompt => (Username, AwaitUsernamePrompt),
            AwaitUsernamePrompt => (Password, AwaitPasswordAck),
            AwaitPasswordAck => (MailFrom, AwaitMailFromAck),
            AwaitMailFromAck => (RcptTo, AwaitRcptToAck),
            AwaitRcptToAck => (Data, AwaitDataPrompt),
            AwaitDataPrompt => (Message, AwaitMessageAck),
            AwaitMessageAck => return Transition::Finish(Quit),
        };
        Transition::Advance { command, next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAPPY_PATH: [u16; 9] = [220, 250, 334, 334, 235, 250, 250, 354, 250];

    #[test]
    fn happy_path_writes_every_command_once_in_order() {
        let mut state = SessionState::AwaitGreeting;
        let mut written = Vec::new();
        for code in HAPPY_PATH {
            match state.on_reply(code) {
                Transition::Advance { command, next } => {
                    written.push(command);
                    state = next;
                }
                Transition::Finish(command) => written.push(command),
                other => panic!("{state:?} rejected {code}: {other:?}"),
            }
        }
        assert_eq!(
            written,
            [
                Command::Ehlo,
                Command::AuthLogin,
                Command::Username,
                Command::Password,
                Command::MailFrom,
                Command::RcptTo,
                Command::Data,
                Command::Message,
                Command::Quit,
            ]
        );
        assert_eq!(state, SessionState::AwaitMessageAck);
    }

    #[test]
    fn failure_codes_are_rejected_in_every_state() {
        let states = [
            SessionState::AwaitGreeting,
            SessionState::AwaitEhloAck,
            SessionState::AwaitAuthPrompt,
            SessionState::AwaitUsernamePrompt,
            SessionState::AwaitMailFromAck,
            SessionState::AwaitRcptToAck,
            SessionState::AwaitDataPrompt,
            SessionState::AwaitMessageAck,
        ];
        for state in states {
            for code in [421, 450, 500, 535, 550, 554] {
                assert_eq!(state.on_reply(code), Transition::Reject, "{state:?} {code}");
            }
        }
    }

    #[test]
    fn any_non_235_after_password_is_a_credential_rejection() {
        for code in [250, 334, 454, 535, 550] {
            assert_eq!(
                SessionState::AwaitPasswordAck.on_reply(code),
                Transition::RejectCredentials
            );
        }
    }

    #[test]
    fn same_class_but_wrong_code_does_not_advance() {
        // 251 is a success code, but MAIL FROM wants exactly 250
        assert_eq!(
            SessionState::AwaitMailFromAck.on_reply(251),
            Transition::Reject
        );
        assert_eq!(SessionState::AwaitGreeting.on_reply(250), Transition::Reject);
        assert_eq!(SessionState::AwaitDataPrompt.on_reply(250), Transition::Reject);
    }
}
