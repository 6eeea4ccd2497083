mod common;
mod shortlist;
