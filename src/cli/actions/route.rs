use crate::portal::{RecoveryCredential, RouteClassifier};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub url: Url,
    pub classifier: RouteClassifier,
}

/// Prints the route `url` classifies as, then each recovery credential it
/// carries in the order the exchanger would try them.
pub fn execute(args: &Args) {
    let route = args.classifier.classify(&args.url, false);
    println!("{route}");

    for credential in RecoveryCredential::candidates(&args.url) {
        let kind = match credential {
            RecoveryCredential::ExchangeCode(_) => "exchange code",
            RecoveryCredential::TokenPair { .. } => "token pair",
        };
        println!("credential: {kind}");
    }
}
