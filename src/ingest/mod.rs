pub mod dir_scanner;
