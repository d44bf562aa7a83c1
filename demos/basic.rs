//! Minimal trellis example: a small blog with a typed view, a controller
//! class and a custom 404 page.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/posts/1
//!   curl http://localhost:3000/posts/9
//!   curl -i http://localhost:3000/posts        # 301 to /posts/
//!   curl -i -X DELETE http://localhost:3000/   # 405

use trellis::{Application, Arguments, Controller, HttpError, Reply, Response, Server, StatusCode};

struct Post {
    id: u32,
    title: &'static str,
}

const POSTS: [Post; 2] = [Post { id: 1, title: "Hello" }, Post { id: 2, title: "Second post" }];

#[derive(Default)]
struct Blog;

impl Blog {
    fn list(&self) -> String {
        POSTS
            .iter()
            .map(|p| format!("<li><a href=\"/posts/{}\">{}</a></li>", p.id, p.title))
            .collect()
    }
}

fn show(args: &Arguments) -> Result<Reply, HttpError> {
    let id: u32 = args.get("id").and_then(|id| id.parse().ok()).unwrap_or_default();
    let post = POSTS
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| HttpError::not_found(format!("post {id} does not exist")))?;
    Ok(Reply::value(Post { id: post.id, title: post.title }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();

    app.class::<Blog>("Blog").method("list", |blog: &Blog, _: &Arguments| format!("<ul>{}</ul>", blog.list()));

    app.get("/", Controller::named("Blog::list"));
    app.get("/posts/", Controller::named("Blog::list"));
    app.get("/posts/{id}", show).assert("id", r"\d+").arg("id").bind("post");

    app.view(|post: &Post, _req| Some(Reply::from(Response::html(format!("<h1>{}</h1>", post.title)))));

    app.error(|_failure, req, status| {
        (status == StatusCode::NOT_FOUND)
            .then(|| Response::builder().status(status).html(format!("<p>Nothing at {}</p>", req.path())))
    });

    app.after(|_req, res| {
        if let Ok(value) = "trellis".parse() {
            res.headers_mut().insert("x-powered-by", value);
        }
    });

    let kernel = app.build().expect("invalid application");

    Server::bind("0.0.0.0:3000")
        .serve(kernel)
        .await
        .expect("server error");
}
