use burrow::{App, Args, Declaration, HandlerError, Options, Response, ScalarType};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Greeter {
    greeting: String,
}

fn hello(greeter: &Greeter, _: &Args) -> Result<Response, HandlerError> {
    Ok(Response::new(format!("<h1>{}</h1>", greeter.greeting)))
}

fn argtest(_: &Greeter, args: &Args) -> Result<Response, HandlerError> {
    let count: i32 = args.get("count")?;
    let name: String = args.get("name")?;

    Ok(Response::new(format!("{name} was given {count} times")))
}

// /namevalue?a=1&b=2
fn namevalue(_: &Greeter, args: &Args) -> Result<Response, HandlerError> {
    let query = args.query().ok_or("no query")?;

    Ok(Response::new(
        query
            .iter()
            .map(|(k, v)| format!("{k}: {v}<br>"))
            .collect::<String>(),
    ))
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burrow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = match std::env::args().nth(1) {
        Some(path) => Options::load(path),
        None => Ok(Options::default()),
    };

    let options = match options {
        Ok(o) => o,
        Err(e) => {
            println!("{e}");
            return;
        }
    };

    println!(
        "Try connecting on a browser at 'http://{}/hello'",
        options.socket_address()
    );

    let res = App::builder(Greeter {
        greeting: "Hello World".to_string(),
    })
    .route(Declaration::new("hello", "/hello", hello))
    .route(
        Declaration::new("argtest", "/argtest/{count:int}/{name}", argtest)
            .param("count", ScalarType::Int)
            .param("name", ScalarType::String),
    )
    .route(Declaration::new("namevalue", "/namevalue", namevalue).query("query"))
    .options(options)
    .run();

    if let Err(e) = res {
        println!("{e:?}");
    };
}
