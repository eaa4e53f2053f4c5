mod common;
mod operator;
mod phases;
mod status;
