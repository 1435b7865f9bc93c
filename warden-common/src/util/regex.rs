use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref USER_MENTION: Regex = Regex::new(r"^<@!?(\d{1,20})>$").unwrap();
    pub static ref ROLE_MENTION: Regex = Regex::new(r"^<@&(\d{1,20})>$").unwrap();
    pub static ref CHANNEL_MENTION: Regex = Regex::new(r"^<#(\d{1,20})>$").unwrap();
    pub static ref SNOWFLAKE: Regex = Regex::new(r"^\d{1,20}$").unwrap();
    pub static ref TIME_STRING: Regex = Regex::new(r"(\d+)([smhd])").unwrap();
    pub static ref COMMAND_NAME: Regex = Regex::new(r"^[-_\p{Ll}\p{Lo}\p{N}]{1,32}$").unwrap();
}
