//! The fixture corpus
//!
//! Six hyperlinked pages plus a sitemap and robots file. Suites assert
//! against this exact graph shape, so paths and links are fixed.

/// Placeholder replaced with the fixture site's bound port
pub const PORT_PLACEHOLDER: &str = "{{PORT}}";

/// One servable document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixturePage {
    pub path: &'static str,
    pub body: &'static str,
}

impl FixturePage {
    pub fn content_type(&self) -> &'static str {
        if self.path.ends_with(".xml") {
            "application/xml"
        } else if self.path.ends_with(".txt") {
            "text/plain"
        } else {
            "text/html"
        }
    }

    /// Render the body for a server bound to `port`
    pub fn render(&self, port: u16) -> String {
        self.body.replace(PORT_PLACEHOLDER, &port.to_string())
    }
}

static PAGES: &[FixturePage] = &[
    FixturePage {
        path: "/",
        body: concat!(
            "<html><head><title>Home</title></head><body>",
            "<h1>Test Site</h1><a href=\"/about\">About</a>",
            "<a href=\"/products\">Products</a>",
            "<a href=\"/contact\">Contact</a></body></html>",
        ),
    },
    FixturePage {
        path: "/about",
        body: concat!(
            "<html><head><title>About</title></head><body>",
            "<h1>About Us</h1><p>We are a test site.</p>",
            "<a href=\"/\">Home</a></body></html>",
        ),
    },
    FixturePage {
        path: "/products",
        body: concat!(
            "<html><head><title>Products</title></head><body>",
            "<h1>Products</h1>",
            "<a href=\"/products/widget\">Widget</a>",
            "<a href=\"/products/gadget\">Gadget</a>",
            "<a href=\"/\">Home</a></body></html>",
        ),
    },
    FixturePage {
        path: "/products/widget",
        body: concat!(
            "<html><head><title>Widget</title></head><body>",
            "<h1>Widget</h1><p>Price: $29.99</p>",
            "<a href=\"/products\">Back</a></body></html>",
        ),
    },
    FixturePage {
        path: "/products/gadget",
        body: concat!(
            "<html><head><title>Gadget</title></head><body>",
            "<h1>Gadget</h1><p>Price: $49.99</p>",
            "<a href=\"/products\">Back</a></body></html>",
        ),
    },
    FixturePage {
        path: "/contact",
        body: concat!(
            "<html><head><title>Contact</title></head><body>",
            "<h1>Contact</h1><form><input name=\"email\"/>",
            "<button type=\"submit\">Send</button></form>",
            "<a href=\"/\">Home</a></body></html>",
        ),
    },
    FixturePage {
        path: "/sitemap.xml",
        body: concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">",
            "<url><loc>http://localhost:{{PORT}}/</loc></url>",
            "<url><loc>http://localhost:{{PORT}}/about</loc></url>",
            "<url><loc>http://localhost:{{PORT}}/products</loc></url>",
            "<url><loc>http://localhost:{{PORT}}/products/widget</loc></url>",
            "<url><loc>http://localhost:{{PORT}}/products/gadget</loc></url>",
            "<url><loc>http://localhost:{{PORT}}/contact</loc></url>",
            "</urlset>",
        ),
    },
    FixturePage {
        path: "/robots.txt",
        body: "User-agent: *\nAllow: /\nSitemap: http://localhost:{{PORT}}/sitemap.xml\n",
    },
];

/// All fixture documents, pages first, in sitemap order
pub fn all_pages() -> &'static [FixturePage] {
    PAGES
}

/// Look up a document by request path
pub fn lookup(path: &str) -> Option<&'static FixturePage> {
    PAGES.iter().find(|p| p.path == path)
}

/// Number of HTML pages in the graph
pub fn html_page_count() -> usize {
    PAGES.iter().filter(|p| p.content_type() == "text/html").count()
}
