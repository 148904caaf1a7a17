mod bot_lifecycle_tests;
mod config_file_tests;
mod property_tests;
