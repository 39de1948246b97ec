mod common;
mod database;
mod integration;
