use rocket::figment::Figment;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use rocket::serde::json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    client: Client,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = dir.path().join("conduit.sqlite3");
        let figment = Figment::from(rocket::Config::debug_default())
            .merge(("database_url", database.to_string_lossy().into_owned()))
            .merge(("jwt_secret", "integration-secret"))
            .merge(("pool_size", 4))
            .merge(("log_level", "off"));
        let rocket = conduit::build(figment).expect("service builds");
        let client = Client::tracked(rocket).expect("valid rocket instance");
        TestApp { client, _dir: dir }
    }

    fn register(&self, username: &str) -> String {
        let body = json!({ "user": {
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "password123",
        }});
        let response = self
            .client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response);
        body["user"]["token"].as_str().expect("token").to_string()
    }

    fn create_article(&self, token: &str, title: &str, tags: &[&str]) -> Value {
        let body = json!({ "article": {
            "title": title,
            "description": format!("{} description", title),
            "body": format!("{} body", title),
            "tagList": tags,
        }});
        let response = self
            .client
            .post("/api/articles")
            .header(ContentType::JSON)
            .header(auth(token))
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        json_body(response)["article"].clone()
    }

    fn favorite(&self, token: &str, slug: &str) -> Value {
        let response = self
            .client
            .post(format!("/api/articles/{}/favorite", slug))
            .header(auth(token))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        json_body(response)["article"].clone()
    }

    fn unfavorite(&self, token: &str, slug: &str) -> Value {
        let response = self
            .client
            .delete(format!("/api/articles/{}/favorite", slug))
            .header(auth(token))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        json_body(response)["article"].clone()
    }

    fn list(&self, query: &str, token: Option<&str>) -> Value {
        let mut request = self.client.get(format!("/api/articles{}", query));
        if let Some(token) = token {
            request = request.header(auth(token));
        }
        let response = request.dispatch();
        assert_eq!(response.status(), Status::Ok);
        json_body(response)
    }
}

fn auth(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Token {}", token))
}

fn json_body(response: LocalResponse) -> Value {
    response.into_json::<Value>().expect("json body")
}

fn titles(list: &Value) -> Vec<String> {
    list["articles"]
        .as_array()
        .expect("articles array")
        .iter()
        .map(|a| a["title"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn create_and_fetch_article() {
    let app = TestApp::new();
    let token = app.register("jake");
    let article = app.create_article(&token, "Hello World", &["greeting", "intro"]);

    let slug = article["slug"].as_str().unwrap();
    assert!(slug.starts_with("hello-world-"));
    assert_eq!(article["tagList"], json!(["greeting", "intro"]));
    assert_eq!(article["favoritesCount"], 0);
    assert_eq!(article["favorited"], false);
    assert_eq!(article["author"]["username"], "jake");
    assert!(article["createdAt"].as_str().unwrap().ends_with('Z'));

    let response = app.client.get(format!("/api/articles/{}", slug)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["article"]["title"], "Hello World");
}

#[test]
fn missing_article_is_404() {
    let app = TestApp::new();
    let response = app.client.get("/api/articles/does-not-exist").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(json_body(response)["errors"]["article"], json!(["not found"]));
}

#[test]
fn creating_requires_authentication() {
    let app = TestApp::new();
    let body = json!({ "article": { "title": "t", "description": "d", "body": "b" } });
    let response = app
        .client
        .post("/api/articles")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app
        .client
        .post("/api/articles")
        .header(ContentType::JSON)
        .header(auth("garbage"))
        .body(body.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn blank_title_is_rejected() {
    let app = TestApp::new();
    let token = app.register("jake");
    let body = json!({ "article": { "title": " ", "description": "d", "body": "b" } });
    let response = app
        .client
        .post("/api/articles")
        .header(ContentType::JSON)
        .header(auth(&token))
        .body(body.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(json_body(response)["errors"]["title"], json!(["empty title"]));
}

#[test]
fn only_the_owner_updates_and_deletes() {
    let app = TestApp::new();
    let owner = app.register("jake");
    let other = app.register("mallory");
    let article = app.create_article(&owner, "Mine", &[]);
    let slug = article["slug"].as_str().unwrap();
    let patch = json!({ "article": { "body": "changed", "slug": "hijacked" } }).to_string();

    let response = app
        .client
        .put(format!("/api/articles/{}", slug))
        .header(ContentType::JSON)
        .header(auth(&other))
        .body(patch.clone())
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .delete(format!("/api/articles/{}", slug))
        .header(auth(&other))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .put(format!("/api/articles/{}", slug))
        .header(ContentType::JSON)
        .header(auth(&owner))
        .body(patch)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let updated = json_body(response)["article"].clone();
    assert_eq!(updated["body"], "changed");
    assert_eq!(updated["slug"], slug);

    let response = app
        .client
        .delete(format!("/api/articles/{}", slug))
        .header(auth(&owner))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = app.client.get(format!("/api/articles/{}", slug)).dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn favorite_round_trip_keeps_the_counter_honest() {
    let app = TestApp::new();
    let author = app.register("jake");
    let fan = app.register("anna");
    let article = app.create_article(&author, "Likeable", &[]);
    let slug = article["slug"].as_str().unwrap();

    let liked = app.favorite(&fan, slug);
    assert_eq!(liked["favorited"], true);
    assert_eq!(liked["favoritesCount"], 1);

    let again = app.favorite(&fan, slug);
    assert_eq!(again["favoritesCount"], 1);

    let unliked = app.unfavorite(&fan, slug);
    assert_eq!(unliked["favorited"], false);
    assert_eq!(unliked["favoritesCount"], 0);

    let unliked = app.unfavorite(&fan, slug);
    assert_eq!(unliked["favoritesCount"], 0);
}

#[test]
fn listing_filters_paginates_and_flags() {
    let app = TestApp::new();
    let jake = app.register("jake");
    let anna = app.register("anna");
    let mut slugs = Vec::new();
    for (i, title) in ["first", "second", "third", "fourth", "fifth"].iter().enumerate() {
        let token = if i % 2 == 0 { &jake } else { &anna };
        let tags: &[&str] = if i < 2 { &["dragons"] } else { &["other"] };
        let article = app.create_article(token, title, tags);
        slugs.push(article["slug"].as_str().unwrap().to_string());
    }

    let all = app.list("", None);
    assert_eq!(all["articlesCount"], 5);
    assert_eq!(titles(&all), ["first", "second", "third", "fourth", "fifth"]);

    let page = app.list("?limit=2&offset=1", None);
    assert_eq!(titles(&page), ["second", "third"]);
    assert_eq!(page["articlesCount"], 5);

    let tagged = app.list("?tag=drag", None);
    assert_eq!(titles(&tagged), ["first", "second"]);

    let by_anna = app.list("?author=anna", None);
    assert_eq!(titles(&by_anna), ["second", "fourth"]);

    let nobody = app.list("?author=nobody", None);
    assert_eq!(nobody["articlesCount"], 0);
    assert_eq!(titles(&nobody), Vec::<String>::new());

    let none_favorited = app.list("?favorited=anna", None);
    assert_eq!(none_favorited["articlesCount"], 0);

    app.favorite(&anna, &slugs[2]);
    app.favorite(&anna, &slugs[4]);
    let favorited = app.list("?favorited=anna", Some(&jake));
    assert_eq!(titles(&favorited), ["third", "fifth"]);
    assert!(favorited["articles"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["favorited"] == false));

    let as_anna = app.list("", Some(&anna));
    let flags = as_anna["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["favorited"].as_bool().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(flags, [false, false, true, false, true]);

    let anonymous = app.list("", Some("not-a-token"));
    assert!(anonymous["articles"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["favorited"] == false));
}

#[test]
fn invalid_token_on_listing_reads_as_anonymous() {
    let app = TestApp::new();
    let jake = app.register("jake");
    let article = app.create_article(&jake, "Open to all", &[]);
    app.favorite(&jake, article["slug"].as_str().unwrap());

    let response = app.client.get("/api/articles").header(auth("garbage")).dispatch();
    assert_eq!(response.status(), Status::Ok);
    let list = json_body(response);
    assert_eq!(list["articlesCount"], 1);
    assert_eq!(list["articles"][0]["favoritesCount"], 1);
    assert_eq!(list["articles"][0]["favorited"], false);

    let response = app
        .client
        .get(format!("/api/articles/{}", article["slug"].as_str().unwrap()))
        .header(auth("garbage"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["article"]["favorited"], false);
}

#[test]
fn empty_query_values_are_ignored() {
    let app = TestApp::new();
    let jake = app.register("jake");
    for title in ["one", "two", "three"] {
        app.create_article(&jake, title, &[]);
    }

    for query in ["?author=", "?favorited=", "?tag=", "?limit=0"] {
        let list = app.list(query, None);
        assert_eq!(list["articlesCount"], 3, "{}", query);
        assert_eq!(titles(&list), ["one", "two", "three"], "{}", query);
    }
}

#[test]
fn duplicate_registration_is_rejected() {
    let app = TestApp::new();
    app.register("jake");
    let body = json!({ "user": {
        "username": "jake",
        "email": "jake@example.com",
        "password": "password123",
    }});
    let response = app
        .client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let errors = json_body(response)["errors"].clone();
    assert!(errors["email"].is_array());
    assert!(errors["username"].is_array());
}

#[test]
fn login_and_current_user() {
    let app = TestApp::new();
    app.register("jake");

    let login = json!({ "user": { "email": "jake@example.com", "password": "password123" } });
    let response = app
        .client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(login.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let token = json_body(response)["user"]["token"].as_str().unwrap().to_string();

    let response = app.client.get("/api/user").header(auth(&token)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    let user = json_body(response)["user"].clone();
    assert_eq!(user["username"], "jake");
    assert!(user.get("password_hash").is_none());

    let wrong = json!({ "user": { "email": "jake@example.com", "password": "wrong-password" } });
    let response = app
        .client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(wrong.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn user_update_applies_allowed_fields() {
    let app = TestApp::new();
    let token = app.register("jake");
    let patch = json!({ "user": { "bio": "I like to skateboard", "username": "jacob" } });
    let response = app
        .client
        .put("/api/user")
        .header(ContentType::JSON)
        .header(auth(&token))
        .body(patch.to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let user = json_body(response)["user"].clone();
    assert_eq!(user["username"], "jacob");
    assert_eq!(user["bio"], "I like to skateboard");

    let response = app.client.get("/api/profiles/jacob").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["profile"]["bio"], "I like to skateboard");
}
