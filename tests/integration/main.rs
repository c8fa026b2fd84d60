mod corpus_tests;
mod crawl_tests;
