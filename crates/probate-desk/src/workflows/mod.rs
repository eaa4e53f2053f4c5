pub mod probate;
