//! Dump a few sample values, then raise an error.
//!
//! Output goes to stdout in the format chosen by `PEEK_FORMAT` (`html`,
//! `cli` or `text`). With `serve <addr>` the demo instead answers a single
//! HTTP request with the rendered dumps and the error page.
//!
//! Logging is controlled by `RUST_LOG`.

use std::cell::RefCell;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::rc::Rc;

use peek::{Config, Context, HttpTransport, Inspectable, Value};
use peek_error::{ErrorFactory, glitch};
use tracing::info;

#[derive(Inspectable)]
#[inspect(name = "demo::User", implements = "demo::Named")]
pub struct User {
    pub name: String,
    pub(crate) email: String,
    password: String,
    pub friend: RefCell<Option<Rc<User>>>,
}

fn user(name: &str) -> Rc<User> {
    Rc::new(User {
        name: name.to_owned(),
        email: format!("{name}@example.com"),
        password: "hunter2".to_owned(),
        friend: RefCell::new(None),
    })
}

fn run(ctx: &mut Context, factory: &ErrorFactory) -> eyre::Result<()> {
    ctx.dump(
        &[
            Value::from("hello\nworld"),
            Value::list([Value::Int(1), Value::Float(2.5), Value::Bool(true), Value::Null]),
            Value::assoc([("id", Value::Int(7)), ("tags", Value::list([Value::from("a")]))]),
        ],
        0,
    )?;

    // Two users that reference each other.
    let ada = user("ada");
    let bob = user("bob");
    *ada.friend.borrow_mut() = Some(Rc::clone(&bob));
    *bob.friend.borrow_mut() = Some(Rc::clone(&ada));
    ctx.dump_named(&[("ada", Value::Object(ada.clone()))], 0)?;
    ada.friend.borrow_mut().take();

    let err = glitch!(factory, "ENotFound, MissingUser", "user {} does not exist", 42)?;
    info!(status = err.http_status(), "raising sample error");
    ctx.dump_error(err)?;
    Ok(())
}

fn serve(addr: &str, config: Config, factory: &ErrorFactory) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!("Listening on {}", listener.local_addr()?);

    let (stream, peer) = listener.accept()?;
    info!(%peer, "accepted connection");

    // Drain the request head; the response does not depend on it.
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    while reader.read_line(&mut line)? > 0 && line != "\r\n" && line != "\n" {
        line.clear();
    }

    let mut ctx = Context::new(config).with_transport(HttpTransport::new(stream));
    run(&mut ctx, factory)?;
    ctx.finish()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peek_demo=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!(format = config.format.as_str(), "starting peek demo");

    let factory = ErrorFactory::new();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, addr] if cmd == "serve" => serve(addr, config, &factory),
        [] => run(&mut Context::new(config), &factory),
        _ => eyre::bail!("usage: peek-demo [serve <addr>]"),
    }
}
