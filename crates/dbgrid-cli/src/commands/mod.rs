pub mod hosts;
pub mod init;
pub mod run;
