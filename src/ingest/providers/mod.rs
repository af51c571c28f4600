pub mod google_trends;
