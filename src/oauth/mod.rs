pub mod google;
pub mod redirect;

use oauth2::basic::BasicClient;
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};

pub const CALENDAR_READONLY: &str = "https://www.googleapis.com/auth/calendar.readonly";

pub trait OauthClient {
    fn get_authorization_url(
        &self,
        scopes: &[&str],
        extra_params: &[(&str, &str)],
    ) -> (
        oauth2::url::Url,
        oauth2::CsrfToken,
        oauth2::PkceCodeVerifier,
    );
}

impl OauthClient for BasicClient {
    fn get_authorization_url(
        &self,
        scopes: &[&str],
        extra_params: &[(&str, &str)],
    ) -> (
        oauth2::url::Url,
        oauth2::CsrfToken,
        oauth2::PkceCodeVerifier,
    ) {
        // Proof Key for Code Exchange (PKCE - https://oauth.net/2/pkce/).
        // Create a PKCE code verifier and SHA-256 encode it as a code challenge.
        let (pkce_code_challenge, pkce_code_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().map(|s| Scope::new((*s).to_owned())));

        for (name, value) in extra_params {
            auth_request = auth_request.add_extra_param((*name).to_owned(), (*value).to_owned());
        }

        let (authorize_url, csrf_state) =
            auth_request.set_pkce_challenge(pkce_code_challenge).url();

        (authorize_url, csrf_state, pkce_code_verifier)
    }
}
