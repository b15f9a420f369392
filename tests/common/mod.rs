//! Record types and descriptor tables shared by the integration tests.
#![allow(dead_code)]

use stencil::{Generator, VarDescriptor};

pub struct Review {
    pub title: String,
    pub stars: i64,
}

impl Review {
    pub fn new(title: &str, stars: i64) -> Review {
        Review {
            title: title.to_string(),
            stars,
        }
    }
}

pub struct Product {
    pub name: String,
    pub manufacturer: Option<String>,
    pub price: i64,
    pub rating: f64,
    pub summary: String,
    pub reviews: Vec<Review>,
    /// Slot the review generator exposes the current item through.
    pub review: Review,
}

impl Product {
    pub fn new() -> Product {
        Product {
            name: "Moto G".to_string(),
            manufacturer: Some("Motorola".to_string()),
            price: 100,
            rating: 4.5,
            summary: "4/5 stars & \"worth it\"".to_string(),
            reviews: vec![Review::new("Great", 5), Review::new("Meh", 2)],
            review: Review::new("", 0),
        }
    }
}

fn product_name(p: &Product) -> Option<&str> {
    Some(&p.name)
}

fn product_manufacturer(p: &Product) -> Option<&str> {
    p.manufacturer.as_deref()
}

fn product_price(p: &Product) -> i64 {
    p.price
}

fn product_rating(p: &Product) -> f64 {
    p.rating
}

fn product_summary(p: &Product) -> Option<&str> {
    Some(&p.summary)
}

fn review_title(p: &Product) -> Option<&str> {
    Some(&p.review.title)
}

fn review_stars(p: &Product) -> i64 {
    p.review.stars
}

struct ReviewGenerator {
    index: usize,
}

impl Generator<Product> for ReviewGenerator {
    fn next(&mut self, product: &mut Product) -> bool {
        match product.reviews.get(self.index) {
            Some(review) => {
                product.review = Review::new(&review.title, review.stars);
                self.index += 1;
                true
            }
            None => false,
        }
    }
}

fn spawn_reviews(_: &mut Product) -> Box<dyn Generator<Product>> {
    Box::new(ReviewGenerator { index: 0 })
}

static REVIEW_VARS: [VarDescriptor<Product>; 2] = [
    VarDescriptor::string("title", review_title),
    VarDescriptor::int("stars", review_stars),
];

pub static PRODUCT_VARS: [VarDescriptor<Product>; 6] = [
    VarDescriptor::string("name", product_name),
    VarDescriptor::string("manufacturer", product_manufacturer),
    VarDescriptor::int("price", product_price),
    VarDescriptor::double("rating", product_rating),
    VarDescriptor::string("summary", product_summary),
    VarDescriptor::list("reviews", spawn_reviews, &REVIEW_VARS),
];
