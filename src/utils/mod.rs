pub mod helper_utils;
pub mod tar_utils;
