mod helpers;

mod expression_tests;
