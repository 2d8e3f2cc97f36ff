//! Adapter registry routing: first match wins, hosts map to the right
//! vendor, and unclaimed URLs fall through to the generic path.

use boardwatch::AdapterRegistry;

fn adapter_for(url: &str) -> Option<&'static str> {
    // Registry construction is cheap; a fresh one per case keeps the
    // assertions independent.
    let registry = AdapterRegistry::standard();
    registry.find(url).map(|a| a.name())
}

#[test]
fn lever_urls_route_to_lever_with_filters_intact() {
    assert_eq!(
        adapter_for("https://jobs.lever.co/acme?location=Zurich"),
        Some("lever")
    );
    assert_eq!(adapter_for("https://jobs.eu.lever.co/acme"), Some("lever"));
}

#[test]
fn meta_careers_routes_to_meta() {
    assert_eq!(adapter_for("https://www.metacareers.com/jobs"), Some("metacareers"));
    assert_eq!(
        adapter_for("https://www.facebookcareers.com/jobs"),
        Some("metacareers")
    );
}

#[test]
fn microsoft_routes_to_microsoft() {
    assert_eq!(
        adapter_for("https://jobs.careers.microsoft.com/global/en/search"),
        Some("microsoft")
    );
}

#[test]
fn proton_board_routes_to_proton_but_other_eu_boards_do_not() {
    assert_eq!(
        adapter_for("https://job-boards.eu.greenhouse.io/proton"),
        Some("proton")
    );
    // Non-Proton boards on the same EU host are not claimed by the Proton
    // adapter (path-constrained) nor by the plain board adapters (host
    // patterns are exact), so they take the generic path.
    assert_eq!(adapter_for("https://job-boards.eu.greenhouse.io/other"), None);
}

#[test]
fn workday_hosts_split_between_cxs_and_dom_adapters() {
    assert_eq!(
        adapter_for("https://nvidia.wd5.myworkdayjobs.com/NVIDIAExternalCareerSite"),
        Some("workday")
    );
    assert_eq!(
        adapter_for("https://wd1.myworkdaysite.com/en-US/recruiting/acme/ext"),
        Some("workday-site")
    );
}

#[test]
fn greenhouse_hosts_split_between_api_and_board_adapters() {
    assert_eq!(
        adapter_for("https://boards.greenhouse.io/acme"),
        Some("greenhouse")
    );
    assert_eq!(
        adapter_for("https://job-boards.greenhouse.io/acme"),
        Some("greenhouse-board")
    );
}

#[test]
fn join_and_ashby_route_to_their_adapters() {
    assert_eq!(adapter_for("https://join.com/companies/acme"), Some("join.com"));
    assert_eq!(
        adapter_for("https://jobs.ashbyhq.com/lakera.ai"),
        Some("ashbyhq")
    );
}

#[test]
fn unclaimed_hosts_fall_through() {
    assert_eq!(adapter_for("https://careers.example.com/jobs"), None);
    assert_eq!(adapter_for("not a url"), None);
}
