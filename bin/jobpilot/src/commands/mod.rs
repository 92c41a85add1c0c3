pub mod apply;
pub mod doctor;
pub mod init_cmd;
pub mod serve;
pub mod sessions;
pub mod submissions;
