//! Server-to-client notices.
//!
//! Everything the café tells a client is a [`Notice`]. They are structured
//! inside the process and rendered to free text only when written to the
//! connection, one `Display` per message (the status report spans four lines).

use std::fmt;

use crate::kind::{Kind, PerKind};
use crate::order::{OrderSnapshot, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Handshake accepted.
    Welcome { name: String },

    /// The handshake line was blank.
    NameRequired,

    /// The handshake name belongs to a live session.
    NameTaken { name: String },

    /// Stock from an `order` command entered the waiting area.
    OrderReceived { name: String, items: PerKind<u32> },

    /// A batch reached the tray.
    BatchReady { name: String, kind: Kind, qty: u32 },

    /// Nothing is waiting or preparing any more.
    OrderReady,

    Status { name: String, snapshot: OrderSnapshot },

    NoOrder { name: String },

    Collected,

    NotReady,

    /// Waiting stock donated from a client that dropped off.
    Reassigned { from: String, items: PerKind<u32> },

    Goodbye { name: String },

    /// A rejected command; the text comes from [`CommandError`](crate::CommandError).
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Welcome { name } => {
                write!(f, "Welcome, {name}, May I have your order, please?")
            }
            Notice::NameRequired => f.write_str("Please introduce yourself with a name."),
            Notice::NameTaken { name } => {
                write!(f, "Sorry, the name {name} is already taken.")
            }
            Notice::OrderReceived { name, items } => write!(
                f,
                "Order received for {name}: {} tea(s) and {} coffee(s).",
                items.tea, items.coffee
            ),
            Notice::BatchReady { name, kind, qty } => write!(
                f,
                "{} ready for {name} ({qty} {}(s) moved to tray)",
                kind.label(),
                kind.name()
            ),
            Notice::OrderReady => f.write_str("Your entire order is now ready for collection!"),
            Notice::Status { name, snapshot } => {
                write!(f, "Order status for {name}:")?;
                for stage in Stage::ALL {
                    write!(f, "\n- {}: {}", stage.label(), snapshot.stage(stage))?;
                }
                Ok(())
            }
            Notice::NoOrder { name } => write!(f, "No order found for {name}"),
            Notice::Collected => f.write_str("Enjoy your drinks!"),
            Notice::NotReady => f.write_str(
                "Your order is not yet ready for collection. Please wait a little longer.",
            ),
            Notice::Reassigned { from, items } => write!(
                f,
                "You have been assigned additional items from {from}'s order ({items})."
            ),
            Notice::Goodbye { name } => write!(f, "Goodbye, {name}!"),
            Notice::Error(message) => f.write_str(message),
        }
    }
}
