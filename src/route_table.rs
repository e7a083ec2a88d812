/// Route catalogue
///
/// Single list of every endpoint the API exposes, with its method, path template and
/// access policy. The router mounts handlers from it and the auth gate classifies
/// requests against it, so the public list and the registered routes cannot diverge.

use actix_web::dev::ResourceDef;
use actix_web::http::Method;
use actix_web::{web, FromRequest, Handler, Responder};

/// Whether a route needs a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    HealthCheck,
    Login,
    Signup,
    Register,
    Refresh,
    Logout,
    CurrentUser,
    ListVehicles,
    GetVehicle,
    ListVehicleReviews,
    ListReviewsForVehicle,
}

impl Route {
    pub const ALL: [Route; 11] = [
        Route::HealthCheck,
        Route::Login,
        Route::Signup,
        Route::Register,
        Route::Refresh,
        Route::Logout,
        Route::CurrentUser,
        Route::ListVehicles,
        Route::GetVehicle,
        Route::ListVehicleReviews,
        Route::ListReviewsForVehicle,
    ];

    pub fn method(self) -> Method {
        match self {
            Route::HealthCheck
            | Route::CurrentUser
            | Route::ListVehicles
            | Route::GetVehicle
            | Route::ListVehicleReviews
            | Route::ListReviewsForVehicle => Method::GET,
            Route::Login | Route::Signup | Route::Register | Route::Refresh | Route::Logout => {
                Method::POST
            }
        }
    }

    /// Path template in actix-web router syntax
    pub fn path(self) -> &'static str {
        match self {
            Route::HealthCheck => "/health_check",
            Route::Login => "/api/user/login",
            Route::Signup => "/api/user/signup",
            Route::Register => "/api/user/register",
            Route::Refresh => "/api/user/refresh",
            Route::Logout => "/api/user/logout",
            Route::CurrentUser => "/api/user/me",
            Route::ListVehicles => "/api/vehicles",
            Route::GetVehicle => r"/api/vehicles/{id:\d+}",
            Route::ListVehicleReviews => r"/api/vehicles/{id:\d+}/reviews",
            Route::ListReviewsForVehicle => r"/api/reviews/vehicle/{id:\d+}",
        }
    }

    pub fn access(self) -> Access {
        match self {
            Route::Logout | Route::CurrentUser => Access::Protected,
            _ => Access::Public,
        }
    }
}

/// Compiled path matchers for every catalogue entry
pub struct RouteTable {
    entries: Vec<(Route, ResourceDef)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        let entries = Route::ALL
            .iter()
            .map(|route| (*route, ResourceDef::new(route.path())))
            .collect();
        Self { entries }
    }

    /// Find the catalogue entry for a method and concrete request path.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Route> {
        self.entries
            .iter()
            .find(|(route, def)| route.method() == *method && def.is_match(path))
            .map(|(route, _)| *route)
    }

    /// Anything that does not resolve to a public entry is protected.
    pub fn access_for(&self, method: &Method, path: &str) -> Access {
        self.resolve(method, path)
            .map_or(Access::Protected, Route::access)
    }
}

/// Register `handler` for a catalogue entry.
pub fn mount<F, Args>(cfg: &mut web::ServiceConfig, route: Route, handler: F)
where
    F: Handler<Args>,
    Args: FromRequest + 'static,
    F::Output: Responder + 'static,
{
    cfg.route(route.path(), web::method(route.method()).to(handler));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_endpoints_resolve() {
        let table = RouteTable::new();

        assert_eq!(table.resolve(&Method::POST, "/api/user/login"), Some(Route::Login));
        assert_eq!(table.resolve(&Method::POST, "/api/user/refresh"), Some(Route::Refresh));
        assert_eq!(table.resolve(&Method::GET, "/api/user/me"), Some(Route::CurrentUser));
    }

    #[test]
    fn public_listing_paths_pass() {
        let table = RouteTable::new();

        assert_eq!(table.access_for(&Method::GET, "/api/vehicles"), Access::Public);
        assert_eq!(table.access_for(&Method::GET, "/api/vehicles/42"), Access::Public);
        assert_eq!(table.access_for(&Method::GET, "/api/vehicles/42/reviews"), Access::Public);
        assert_eq!(table.access_for(&Method::GET, "/api/reviews/vehicle/7"), Access::Public);
        assert_eq!(table.access_for(&Method::GET, "/health_check"), Access::Public);
    }

    #[test]
    fn vehicle_id_must_be_numeric() {
        let table = RouteTable::new();

        assert_eq!(table.resolve(&Method::GET, "/api/vehicles/abc"), None);
        assert_eq!(table.access_for(&Method::GET, "/api/vehicles/abc"), Access::Protected);

        assert_eq!(table.resolve(&Method::GET, "/api/vehicles/abc/reviews"), None);
        assert_eq!(
            table.access_for(&Method::GET, "/api/vehicles/abc/reviews"),
            Access::Protected
        );

        assert_eq!(table.resolve(&Method::GET, "/api/reviews/vehicle/abc"), None);
        assert_eq!(
            table.access_for(&Method::GET, "/api/reviews/vehicle/abc"),
            Access::Protected
        );
    }

    #[test]
    fn method_is_part_of_the_match() {
        let table = RouteTable::new();

        assert_eq!(table.access_for(&Method::POST, "/api/vehicles"), Access::Protected);
        assert_eq!(table.access_for(&Method::DELETE, "/api/vehicles/1"), Access::Protected);
        assert_eq!(table.access_for(&Method::GET, "/api/user/login"), Access::Protected);
    }

    #[test]
    fn unknown_paths_are_protected() {
        let table = RouteTable::new();

        assert_eq!(table.access_for(&Method::GET, "/api/bookings"), Access::Protected);
        assert_eq!(table.access_for(&Method::GET, "/api/vehicles/1/extra"), Access::Protected);
        assert_eq!(table.access_for(&Method::GET, "/"), Access::Protected);
    }

    #[test]
    fn logout_and_me_require_a_token() {
        let table = RouteTable::new();

        assert_eq!(table.access_for(&Method::POST, "/api/user/logout"), Access::Protected);
        assert_eq!(table.access_for(&Method::GET, "/api/user/me"), Access::Protected);
    }

    #[test]
    fn every_route_resolves_to_itself() {
        let table = RouteTable::new();
        let samples = [
            (Route::GetVehicle, "/api/vehicles/3"),
            (Route::ListVehicleReviews, "/api/vehicles/3/reviews"),
            (Route::ListReviewsForVehicle, "/api/reviews/vehicle/3"),
        ];

        for route in Route::ALL {
            if let Some((_, sample)) = samples.iter().find(|(r, _)| *r == route) {
                assert_eq!(table.resolve(&route.method(), sample), Some(route));
            } else {
                assert_eq!(table.resolve(&route.method(), route.path()), Some(route));
            }
        }
    }
}
