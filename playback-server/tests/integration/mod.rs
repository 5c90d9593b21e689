pub mod hub_tests;
