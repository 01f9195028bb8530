// Aggregates all former standalone integration tests as modules.
mod account;
mod config;
mod export;
mod jobs;
mod proxy;
mod typeahead;
