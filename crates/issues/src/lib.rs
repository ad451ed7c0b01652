//! `siteops-issues` — site issue tracking: tickets and non-conformance reports.

pub mod ncr;
pub mod ticket;

pub use ncr::{
    AssignNcr, CloseNcr, Ncr, NcrCommand, NcrEvent, NcrId, NcrStatus, RaiseNcr, ResolveNcr,
    StartInvestigation,
};
pub use ticket::{
    AssignTicket, CloseTicket, OpenTicket, ReopenTicket, ResolveTicket, StartTicket, Ticket,
    TicketCommand, TicketEvent, TicketId, TicketStatus,
};
