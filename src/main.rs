#[rocket::launch]
fn rocket() -> _ {
    conduit::rocket().expect("Failed to initialise the database")
}
