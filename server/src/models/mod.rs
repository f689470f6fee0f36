use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Status-like enums are stored as upper-case TEXT columns.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::models::ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}


pub mod band;
pub mod event;
pub mod order;
pub mod ticket;
pub mod user;
pub mod venue;

pub use band::Band;
pub use event::{
    DateWindow, Event, EventFilter, EventPatch, EventStatus, EventSummary, NewEvent,
};
pub use order::{
    order_total, NewOrder, Order, OrderLine, OrderLineRequest, OrderStatus, OrderWithLines,
};
pub use ticket::{MyTicket, NewTicketType, Ticket, TicketType, TicketTypeView};
pub use user::{NewUser, Role, User};
pub use venue::{NewVenueSuggestion, SuggestionStatus, Venue, VenueSuggestion};
