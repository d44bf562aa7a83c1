use trellis::{Application, Arguments, Config, Error, Kernel, Method, Params, Request, Response, StatusCode};

fn send(kernel: &Kernel, method: Method, uri: &str) -> Response {
    kernel.handle(Request::create(method, uri).unwrap())
}

fn get(kernel: &Kernel, uri: &str) -> Response {
    send(kernel, Method::GET, uri)
}

#[test]
fn maps_paths_to_controllers() {
    let mut app = Application::new();
    app.route("/foo", |_: &Arguments| "foo");
    app.route("/bar", |_: &Arguments| "bar");
    app.route("/", |_: &Arguments| "root");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/foo").content(), "foo");
    assert_eq!(get(&kernel, "/bar").content(), "bar");
    assert_eq!(get(&kernel, "/").content(), "root");
}

#[test]
fn first_registered_route_wins() {
    let mut app = Application::new();
    app.get("/{page}", |_: &Arguments| "placeholder");
    app.get("/about", |_: &Arguments| "about");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/about").content(), "placeholder");
}

#[test]
fn placeholders_bind_to_declared_arguments() {
    let mut app = Application::new();
    app.get("/hello/{name}", |args: &Arguments| format!("Hello {}", args.get("name").unwrap_or("?")))
        .arg("name");
    app.get("/posts/{id}", |args: &Arguments| format!("post {}", args.get("id").unwrap_or("?")))
        .assert("id", r"\d+")
        .arg("id");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/hello/world").content(), "Hello world");
    assert_eq!(get(&kernel, "/hello/caf%C3%A9").content(), "Hello café");
    assert_eq!(get(&kernel, "/posts/42").content(), "post 42");
    assert_eq!(get(&kernel, "/posts/latest").status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn defaults_make_trailing_placeholders_optional() {
    let mut app = Application::new();
    app.get("/blog/{page}", |args: &Arguments| format!("page {}", args.get("page").unwrap_or("?")))
        .value("page", "1")
        .arg("page");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/blog").content(), "page 1");
    assert_eq!(get(&kernel, "/blog/3").content(), "page 3");
}

#[test]
fn optional_placeholder_at_the_root_matches_slash() {
    let mut app = Application::new();
    app.get("/{page}", |args: &Arguments| format!("page {}", args.get("page").unwrap_or("?")))
        .value("page", "1")
        .arg("page")
        .bind("home");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/").content(), "page 1");
    assert_eq!(get(&kernel, "/2").content(), "page 2");
    assert_eq!(kernel.path("home", &Params::new()).unwrap(), "/");
}

#[test]
fn anchored_requirements_still_match() {
    let mut app = Application::new();
    app.get("/u/{id}", |args: &Arguments| format!("user {}", args.get("id").unwrap_or("?")))
        .assert("id", r"^\d+$")
        .arg("id");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/u/42").content(), "user 42");
    assert_eq!(get(&kernel, "/u/bob").status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn method_requirements() {
    let mut app = Application::new();
    app.route("/foo", |_: &Arguments| "foo").method("GET|post");
    app.put("/bar", |_: &Arguments| "put");
    app.patch("/bar", |_: &Arguments| "patch");
    app.delete("/bar", |_: &Arguments| "delete");
    let kernel = app.build().unwrap();

    assert_eq!(send(&kernel, Method::GET, "/foo").content(), "foo");
    assert_eq!(send(&kernel, Method::POST, "/foo").content(), "foo");
    assert_eq!(send(&kernel, Method::PUT, "/bar").content(), "put");
    assert_eq!(send(&kernel, Method::PATCH, "/bar").content(), "patch");
    assert_eq!(send(&kernel, Method::DELETE, "/bar").content(), "delete");
}

#[test]
fn wrong_method_is_405_with_allow_header() {
    let mut app = Application::new();
    app.route("/foo", |_: &Arguments| "foo").method("GET|POST");
    let kernel = app.build().unwrap();

    let res = send(&kernel, Method::PUT, "/foo");
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET, HEAD, POST"));
}

#[test]
fn head_requests_match_get_routes() {
    let mut app = Application::new();
    app.get("/foo", |_: &Arguments| "foo");
    let kernel = app.build().unwrap();

    assert_eq!(send(&kernel, Method::HEAD, "/foo").status_code(), StatusCode::OK);
}

#[test]
fn unknown_path_is_404() {
    let mut app = Application::new();
    app.get("/foo", |_: &Arguments| "foo");
    let kernel = app.build().unwrap();

    let res = get(&kernel, "/baz");
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert!(res.content().contains("Oops! An Error Occurred"));
}

#[test]
fn missing_trailing_slash_redirects() {
    let mut app = Application::new();
    app.get("/foo/", |_: &Arguments| "foo");
    let kernel = app.build().unwrap();

    let res = get(&kernel, "/foo");
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.location(), Some("/foo/"));

    let res = get(&kernel, "/foo?page=2");
    assert_eq!(res.location(), Some("/foo/?page=2"));

    assert_eq!(send(&kernel, Method::POST, "/foo").status_code(), StatusCode::NOT_FOUND);
}

#[test]
fn require_https_redirects_plain_requests() {
    let mut app = Application::new();
    app.get("/secured", |_: &Arguments| "secured content").require_https();
    let kernel = app.build().unwrap();

    let res = get(&kernel, "http://example.com/secured?query=string");
    assert!(res.is_redirect());
    assert_eq!(res.location(), Some("https://example.com/secured?query=string"));

    assert_eq!(get(&kernel, "https://example.com/secured").content(), "secured content");
}

#[test]
fn require_http_redirects_secure_requests() {
    let mut app = Application::with_config(Config::default().http_port(8080));
    app.get("/insecured", |_: &Arguments| "insecured content").require_http();
    let kernel = app.build().unwrap();

    let res = get(&kernel, "https://example.com/insecured");
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.location(), Some("http://example.com:8080/insecured"));
}

#[test]
fn scheme_redirect_only_when_nothing_else_matches() {
    let mut app = Application::new();
    app.get("/page", |_: &Arguments| "secure").require_https();
    app.get("/page", |_: &Arguments| "plain");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "http://example.com/page").content(), "plain");
    assert_eq!(get(&kernel, "https://example.com/page").content(), "secure");
}

#[test]
fn failing_condition_is_a_non_match() {
    let mut app = Application::new();
    app.get("/beta", |_: &Arguments| "beta").when(|req, _| req.header("x-beta") == Some("on"));
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "/beta").status_code(), StatusCode::NOT_FOUND);

    let req = Request::create(Method::GET, "/beta").unwrap().with_header("x-beta", "on");
    assert_eq!(kernel.handle(req).content(), "beta");
}

#[test]
fn host_placeholders_bind_like_path_ones() {
    let mut app = Application::new();
    app.get("/", |args: &Arguments| format!("account {}", args.get("account").unwrap_or("?")))
        .host("{account}.example.com")
        .arg("account");
    app.get("/", |_: &Arguments| "main site");
    let kernel = app.build().unwrap();

    assert_eq!(get(&kernel, "http://acme.example.com/").content(), "account acme");
    assert_eq!(get(&kernel, "http://example.org/").content(), "main site");
}

#[test]
fn configuration_errors_fail_the_build() {
    let mut app = Application::new();
    app.get("/foo/{id", |_: &Arguments| "x");
    assert!(matches!(app.build(), Err(Error::InvalidPattern { .. })));

    let mut app = Application::new();
    app.get("/foo/{id}", |_: &Arguments| "x").assert("id", "(");
    assert!(matches!(app.build(), Err(Error::InvalidRequirement { .. })));

    let mut app = Application::new();
    app.route("/foo", |_: &Arguments| "x").method("GET|P OST");
    assert!(matches!(app.build(), Err(Error::InvalidMethod(_))));

    let mut app = Application::new();
    app.get("/foo/{id}", |_: &Arguments| "x").arg("id").arg("user");
    match app.build() {
        Err(Error::UnboundArgument { argument, .. }) => assert_eq!(argument, "user"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("build should fail"),
    }
}

#[test]
fn generates_paths_and_urls_for_named_routes() {
    let mut app = Application::new();
    app.get("/posts/{id}", |_: &Arguments| "post").bind("post");
    app.get("/blog/{page}", |_: &Arguments| "blog").value("page", "1").bind("blog");
    app.get("/login", |_: &Arguments| "login").require_https().bind("login");
    app.get("/", |_: &Arguments| "home").host("{account}.example.com").bind("account");
    let kernel = app.build().unwrap();

    let params: Params = [("id", "2")].into_iter().collect();
    assert_eq!(kernel.path("post", &params).unwrap(), "/posts/2");
    assert_eq!(kernel.path("blog", &Params::new()).unwrap(), "/blog");
    assert_eq!(kernel.path("blog", &[("page", "3")].into_iter().collect::<Params>()).unwrap(), "/blog/3");

    let req = Request::create(Method::GET, "http://example.com:8080/").unwrap();
    assert_eq!(kernel.url("post", &params, &req).unwrap(), "http://example.com:8080/posts/2");
    assert_eq!(kernel.url("login", &Params::new(), &req).unwrap(), "https://example.com/login");

    let acme: Params = [("account", "acme")].into_iter().collect();
    assert_eq!(kernel.url("account", &acme, &req).unwrap(), "http://acme.example.com:8080/");

    assert!(matches!(kernel.path("nope", &Params::new()), Err(Error::UnknownRoute(_))));
    assert!(matches!(kernel.path("post", &Params::new()), Err(Error::MissingParameter { .. })));
}

#[test]
fn unnamed_routes_get_generated_names() {
    let mut app = Application::new();
    app.get("/foo/{id}", |_: &Arguments| "foo");
    app.route("/", |_: &Arguments| "root");
    let kernel = app.build().unwrap();

    let params: Params = [("id", "7")].into_iter().collect();
    assert_eq!(kernel.path("GET_foo_id", &params).unwrap(), "/foo/7");
    assert_eq!(kernel.path("_root_", &Params::new()).unwrap(), "/");
}
