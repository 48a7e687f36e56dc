//! Fuzz target for the command parser and [`ParticipantHandle`] transitions
//!
//! Prevent a malformed or out-of-order line from corrupting a connection
//!
//! # Strategy
//!
//! - Raw lines: Arbitrary bytes, decoded lossily as the coordinator does
//! - Structured lines: Valid keywords with fuzzed arguments, to get past the
//!   keyword check often enough to exercise the arity and port paths
//! - Side effects: Joins may fail (unreachable endpoint) and active handles
//!   may be evicted behind the handler's back
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A parsed command renders to a line that parses back to the same command
//! - `Active` ONLY reachable via an accepted register/reconnect whose join
//!   succeeded
//! - A rejected command leaves state and identity untouched
//! - `reconnect` accepted ONLY from `Disconnected`
//! - `Unregistered` handles carry no identity

#![no_main]

use arbitrary::Arbitrary;
use groupcast_core::{Command, HandleId, HandleState, ParticipantHandle, Transition};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum FuzzLine {
    Raw(Vec<u8>),
    Structured { keyword: Keyword, args: Vec<String> },
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Keyword {
    Register,
    Deregister,
    Disconnect,
    Reconnect,
    Msend,
}

impl FuzzLine {
    fn render(&self) -> String {
        match self {
            Self::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Structured { keyword, args } => {
                let keyword = match keyword {
                    Keyword::Register => "register",
                    Keyword::Deregister => "deregister",
                    Keyword::Disconnect => "disconnect",
                    Keyword::Reconnect => "reconnect",
                    Keyword::Msend => "msend",
                };
                let mut line = keyword.to_string();
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                line
            },
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum Event {
    Line { line: FuzzLine, join_succeeds: bool },
    Evicted,
}

fuzz_target!(|events: Vec<Event>| {
    let mut handle = ParticipantHandle::new(HandleId(1));

    for event in events {
        match event {
            Event::Evicted => {
                let was_active = handle.state() == HandleState::Active;
                let changed = handle.reconcile(false);
                assert_eq!(changed, was_active);
                assert_ne!(handle.state(), HandleState::Active);
            },
            Event::Line { line, join_succeeds } => {
                let Ok(command) = Command::parse(&line.render()) else {
                    continue;
                };

                let rendered = command.to_string();
                assert_eq!(Command::parse(&rendered).as_ref(), Ok(&command), "{rendered}");

                let before = handle.state();
                let identity_before = handle.identity().map(str::to_string);

                match handle.plan(command) {
                    Ok(Transition::Join { identity, replay, .. }) => {
                        if replay {
                            assert_eq!(before, HandleState::Disconnected);
                        } else {
                            assert_eq!(before, HandleState::Unregistered);
                        }
                        if join_succeeds {
                            handle.activate(identity.clone());
                            assert_eq!(handle.identity(), Some(identity.as_str()));
                        }
                    },
                    Ok(Transition::Leave { next }) => {
                        assert_eq!(before, HandleState::Active);
                        handle.leave(next);
                    },
                    Ok(Transition::Send { words }) => {
                        assert_eq!(before, HandleState::Active);
                        assert!(!words.is_empty());
                    },
                    Err(_) => {
                        assert_eq!(handle.state(), before);
                        assert_eq!(handle.identity().map(str::to_string), identity_before);
                    },
                }

                if handle.state() == HandleState::Active && before != HandleState::Active {
                    assert!(join_succeeds);
                }
            },
        }

        if handle.state() == HandleState::Unregistered {
            assert_eq!(handle.identity(), None);
        }
    }
});
